//! String-keyed dictionary over a [`DoubleArray`] and a value array.
//!
//! [`DictionaryBuilder`] stages key/value pairs, sorts them once by key and
//! lays the keys out as a double array. The value array is stored in the same
//! sorted-key order, so the automaton's terminal index for a key is the
//! position of its value.

use std::ops::Index;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::builder::{build_double_array, BuildOptions, BuildStats, Normalization};
use crate::codes::{CodeTableBuilder, SENTINEL};
use crate::double_array::DoubleArray;
use crate::error::{BuildError, BuildResult, FormatError, FormatResult, LookupError};
use crate::frozen;
use crate::trie::Trie;

#[derive(Debug, Clone)]
pub struct DictionaryBuilder<T> {
    entries: Vec<(String, T)>,
    options: BuildOptions,
}

impl<T> Default for DictionaryBuilder<T> {
    fn default() -> Self {
        Self::with_options(BuildOptions::default())
    }
}

impl<T> DictionaryBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BuildOptions) -> Self {
        DictionaryBuilder {
            entries: Vec::new(),
            options,
        }
    }

    /// Registers `value` under `key`. A later add for the same key wins.
    pub fn add(&mut self, key: impl AsRef<str>, value: T) {
        let key = self.options.normalization.apply(key.as_ref()).into_owned();
        self.entries.push((key, value));
    }

    /// Number of staged pairs, duplicates included.
    pub fn staged(&self) -> usize {
        self.entries.len()
    }

    pub fn build(self) -> BuildResult<Dictionary<T>> {
        self.build_with_stats().map(|(dict, _)| dict)
    }

    pub fn build_with_stats(self) -> BuildResult<(Dictionary<T>, BuildStats)> {
        let DictionaryBuilder {
            mut entries,
            options,
        } = self;

        // stable, so equal keys stay in insertion order and the retained
        // entry can take the value of the last one
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|later, kept| {
            if later.0 != kept.0 {
                return false;
            }
            std::mem::swap(&mut later.1, &mut kept.1);
            true
        });

        let mut trie = Trie::new();
        let mut codes = CodeTableBuilder::new();
        for (key, _) in &entries {
            if key.encode_utf16().any(|u| u == SENTINEL) {
                return Err(BuildError::SentinelInKey { key: key.clone() });
            }
            let index = trie.add(key);
            debug_assert_eq!(index as usize, trie.len() - 1);
            codes.add(key);
        }

        let (array, stats) = build_double_array(&trie, codes.build(), options.max_probe)?;
        let values = entries.into_iter().map(|(_, v)| v).collect();
        let dict = Dictionary {
            array,
            values,
            normalization: options.normalization,
        };
        Ok((dict, stats))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDictionary<T>")]
pub struct Dictionary<T> {
    array: DoubleArray,
    values: Vec<T>,
    normalization: Normalization,
}

#[derive(Deserialize)]
struct RawDictionary<T> {
    array: DoubleArray,
    values: Vec<T>,
    normalization: Normalization,
}

impl<T> TryFrom<RawDictionary<T>> for Dictionary<T> {
    type Error = FormatError;

    fn try_from(raw: RawDictionary<T>) -> FormatResult<Self> {
        Dictionary::paired(raw.array, raw.values, raw.normalization)
    }
}

impl<T> Dictionary<T> {
    /// Pairs an automaton with the value array it was built for. Fails if
    /// some key would resolve past the end of `values`.
    pub fn from_parts(array: DoubleArray, values: Vec<T>) -> FormatResult<Self> {
        Self::paired(array, values, Normalization::None)
    }

    fn paired(
        array: DoubleArray,
        values: Vec<T>,
        normalization: Normalization,
    ) -> FormatResult<Self> {
        if let Some(max) = array.max_value_index() {
            if max >= values.len() {
                return Err(FormatError::Corrupt(format!(
                    "automaton resolves value index {} but only {} values are present",
                    max,
                    values.len()
                )));
            }
        }
        Ok(Dictionary {
            array,
            values,
            normalization,
        })
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Index of `key` in the value array.
    pub fn find(&self, key: &str) -> Option<usize> {
        self.array.find(&self.normalization.apply(key))
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        match self.lookup(key) {
            Ok(value) => Some(value),
            Err(LookupError::KeyNotFound) => None,
            Err(err) => {
                error!(key, %err, "automaton and value array disagree");
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Like [`get`](Self::get), but tells an absent key apart from an index
    /// that falls outside the value array.
    pub fn lookup(&self, key: &str) -> Result<&T, LookupError> {
        let index = self.find(key).ok_or(LookupError::KeyNotFound)?;
        self.values
            .get(index)
            .ok_or(LookupError::IndexOutOfBounds {
                index,
                len: self.values.len(),
            })
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn automaton(&self) -> &DoubleArray {
        &self.array
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T: Serialize> Dictionary<T> {
    pub fn to_bytes(&self) -> FormatResult<Vec<u8>> {
        let payload = serde_json::to_vec(&self.values)?;
        let mut out = Vec::with_capacity(
            frozen::ARRAY_HEADER + self.array.len() * 8 + frozen::DICT_TRAILER + payload.len(),
        );
        frozen::write_array(&mut out, &self.array);
        let flags = match self.normalization {
            Normalization::None => 0,
            Normalization::Nfc => frozen::FLAG_NFC,
        };
        frozen::write_values(&mut out, flags, self.values.len(), &payload);
        Ok(out)
    }
}

impl<T: DeserializeOwned> Dictionary<T> {
    pub fn from_bytes(data: &[u8]) -> FormatResult<Self> {
        let mut reader = frozen::Reader::new(data);
        let array = frozen::read_array(&mut reader)?;
        let (flags, count, payload) = frozen::read_values(&mut reader)?;
        reader.finish()?;

        let values: Vec<T> = serde_json::from_slice(payload)?;
        if values.len() != count {
            return Err(FormatError::Corrupt(format!(
                "header declares {} values, payload holds {}",
                count,
                values.len()
            )));
        }
        let normalization = if flags & frozen::FLAG_NFC != 0 {
            Normalization::Nfc
        } else {
            Normalization::None
        };
        Self::paired(array, values, normalization)
    }
}

impl<T> Index<&str> for Dictionary<T> {
    type Output = T;

    /// Panics if the key is absent or resolves outside the value array.
    fn index(&self, key: &str) -> &T {
        match self.lookup(key) {
            Ok(value) => value,
            Err(err) => panic!("{err}: {key:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pets() -> Dictionary<i32> {
        let mut b = DictionaryBuilder::new();
        b.add("cat", 1);
        b.add("car", 2);
        b.add("dog", 3);
        b.build().unwrap()
    }

    #[test]
    fn cat_car_dog() {
        let d = pets();
        assert_eq!(d.get("cat"), Some(&1));
        assert_eq!(d.get("car"), Some(&2));
        assert_eq!(d.get("dog"), Some(&3));
        assert_eq!(d.find("ca"), None);
        assert_eq!(d.find("ca t"), None);
        assert!(d.contains("dog"));
        assert!(!d.contains("do"));
        assert_eq!(d["cat"], 1);
    }

    #[test]
    fn values_follow_key_order() {
        let d = pets();
        // car < cat < dog
        assert_eq!(d.values(), &[2, 1, 3]);
        assert_eq!(d.find("car"), Some(0));
        assert_eq!(d.find("dog"), Some(2));
    }

    #[test]
    fn last_add_wins() {
        let mut b = DictionaryBuilder::new();
        b.add("k", "first");
        b.add("other", "x");
        b.add("k", "second");
        b.add("k", "third");
        assert_eq!(b.staged(), 4);
        let d = b.build().unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.get("k"), Some(&"third"));
        assert_eq!(d.values(), &["third", "x"]);
    }

    #[test]
    fn empty_dictionary_finds_nothing() {
        let d = DictionaryBuilder::<u8>::new().build().unwrap();
        assert!(d.is_empty());
        assert_eq!(d.get(""), None);
        assert_eq!(d.get("a"), None);
    }

    #[test]
    fn empty_string_key() {
        let mut b = DictionaryBuilder::new();
        b.add("", 0u8);
        b.add("a", 1);
        let d = b.build().unwrap();
        assert_eq!(d.get(""), Some(&0));
        assert_eq!(d.get("a"), Some(&1));
        assert_eq!(d.get("aa"), None);
    }

    #[test]
    fn non_ascii_keys() {
        let mut b = DictionaryBuilder::new();
        for (i, k) in ["りんご", "りんごジュース", "みかん", "🍎", "🍏", "äpfel"]
            .iter()
            .enumerate()
        {
            b.add(k, i);
        }
        let d = b.build().unwrap();
        assert_eq!(d.get("りんご"), Some(&0));
        assert_eq!(d.get("りんごジュース"), Some(&1));
        assert_eq!(d.get("みかん"), Some(&2));
        assert_eq!(d.get("🍎"), Some(&3));
        assert_eq!(d.get("🍏"), Some(&4));
        assert_eq!(d.get("äpfel"), Some(&5));
        assert_eq!(d.get("りん"), None);
        assert_eq!(d.get("🍐"), None);
    }

    #[test]
    fn nul_in_key_is_rejected() {
        let mut b = DictionaryBuilder::new();
        b.add("a\0b", 1);
        assert!(matches!(
            b.build(),
            Err(BuildError::SentinelInKey { .. })
        ));
    }

    #[test]
    fn short_value_array_is_rejected() {
        let d = pets();
        assert!(matches!(
            Dictionary::from_parts(d.automaton().clone(), vec![10]),
            Err(FormatError::Corrupt(_))
        ));
        let paired = Dictionary::from_parts(d.automaton().clone(), vec![10, 20, 30]).unwrap();
        assert_eq!(paired.lookup("dog"), Ok(&30));
        assert_eq!(paired.lookup("cow"), Err(LookupError::KeyNotFound));
    }

    #[test]
    fn blob_with_too_few_values_is_rejected() {
        let d = pets();
        let mut bytes = Vec::new();
        frozen::write_array(&mut bytes, d.automaton());
        frozen::write_values(&mut bytes, 0, 1, b"[10]");
        assert!(matches!(
            Dictionary::<i32>::from_bytes(&bytes),
            Err(FormatError::Corrupt(_))
        ));
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_panics_on_missing_key() {
        let d = pets();
        let _value: i32 = d["cow"];
    }

    #[test]
    fn nfc_keys_match_either_form() {
        let options = BuildOptions {
            normalization: Normalization::Nfc,
            ..BuildOptions::default()
        };
        let mut b = DictionaryBuilder::with_options(options);
        b.add("cafe\u{301}", 1);
        let d = b.build().unwrap();
        assert_eq!(d.get("caf\u{e9}"), Some(&1));
        assert_eq!(d.get("cafe\u{301}"), Some(&1));

        let plain = Dictionary::from_parts(d.automaton().clone(), d.values().to_vec()).unwrap();
        assert_eq!(plain.get("cafe\u{301}"), None);
        let renormalized = plain.with_normalization(Normalization::Nfc);
        assert_eq!(renormalized.get("cafe\u{301}"), Some(&1));
    }

    #[test]
    fn frozen_bytes_round_trip() {
        let mut b = DictionaryBuilder::with_options(BuildOptions {
            normalization: Normalization::Nfc,
            ..BuildOptions::default()
        });
        b.add("alpha", vec!["a".to_string()]);
        b.add("beta", vec![]);
        b.add("gamma", vec!["g".to_string(), "G".to_string()]);
        let d = b.build().unwrap();

        let bytes = d.to_bytes().unwrap();
        let back: Dictionary<Vec<String>> = Dictionary::from_bytes(&bytes).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.normalization(), Normalization::Nfc);
        assert_eq!(back["gamma"], vec!["g", "G"]);
    }

    #[test]
    fn value_count_mismatch_is_rejected() {
        let d = pets();
        let mut bytes = Vec::new();
        frozen::write_array(&mut bytes, d.automaton());
        frozen::write_values(&mut bytes, 0, 5, b"[2,1,3]");
        assert!(matches!(
            Dictionary::<i32>::from_bytes(&bytes),
            Err(FormatError::Corrupt(_))
        ));
    }

    #[test]
    fn bad_payload_is_rejected() {
        let d = pets();
        let mut bytes = Vec::new();
        frozen::write_array(&mut bytes, d.automaton());
        frozen::write_values(&mut bytes, 0, 3, b"[2,1,");
        assert!(matches!(
            Dictionary::<i32>::from_bytes(&bytes),
            Err(FormatError::Values(_))
        ));
    }

    #[test]
    fn serde_json_round_trip() {
        let d = pets();
        let json = serde_json::to_string(&d).unwrap();
        let back: Dictionary<i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn serde_json_rejects_short_values() {
        let d = pets();
        let mut json: serde_json::Value = serde_json::to_value(&d).unwrap();
        json["values"] = serde_json::json!([1]);
        assert!(serde_json::from_value::<Dictionary<i32>>(json).is_err());
    }
}
