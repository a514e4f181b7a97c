/// Growable `i32` array used for `base` and `check` during construction.
///
/// Reads past the end return 0, writes past the end zero-fill up to the
/// written index. Slot 0 is reserved and never written.
#[derive(Debug, Clone, Default)]
pub(crate) struct Slots {
    values: Vec<i32>,
}

impl Slots {
    pub fn from_vec(values: Vec<i32>) -> Self {
        Slots { values }
    }

    #[inline]
    pub fn get(&self, index: usize) -> i32 {
        self.values.get(index).copied().unwrap_or(0)
    }

    pub fn set(&mut self, index: usize, value: i32) {
        if index == 0 {
            return;
        }
        if index >= self.values.len() {
            self.values.resize(index + 1, 0);
        }
        self.values[index] = value;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Pads to `len` with zeros and hands back the raw vector.
    pub fn into_vec(mut self, len: usize) -> Vec<i32> {
        if self.values.len() < len {
            self.values.resize(len, 0);
        }
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_past_end_is_zero() {
        let s = Slots::from_vec(vec![0, 5]);
        assert_eq!(s.get(1), 5);
        assert_eq!(s.get(2), 0);
        assert_eq!(s.get(1000), 0);
    }

    #[test]
    fn write_past_end_zero_fills() {
        let mut s = Slots::default();
        s.set(4, 7);
        assert_eq!(s.len(), 5);
        assert_eq!(s.get(3), 0);
        assert_eq!(s.get(4), 7);
    }

    #[test]
    fn into_vec_pads() {
        let s = Slots::from_vec(vec![0, 1]);
        assert_eq!(s.into_vec(4), vec![0, 1, 0, 0]);
    }
}
