use std::fmt;

use crate::fs::error::{FileSystemError, Result};

const BITS_PER_WORD: u64 = u64::BITS as u64;

/// 覆盖闭区间 `[min, max]` 的位图，每个 bit 表示一个值（inode 号或扇区号）是否被使用
///
/// 位图只存在于内存中，挂载时通过扫描磁盘上的元数据重建。
#[derive(Debug, Clone)]
pub struct BitmapArray {
    words: Vec<u64>,
    min: u64,
    max: u64,
    // 已知仍可能含有空闲位的最早的字下标
    cursor: usize,
}

impl BitmapArray {
    // 创建一个新的位图（所有位清零 = 空闲）
    pub fn new(min: u64, max: u64) -> Result<Self> {
        if min > max {
            return Err(FileSystemError::BadParameter);
        }
        let length = ((max - min) / BITS_PER_WORD + 1) as usize;
        Ok(Self {
            words: vec![0; length],
            min,
            max,
            cursor: 0,
        })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn contains(&self, x: u64) -> bool {
        self.min <= x && x <= self.max
    }

    fn locate(&self, x: u64) -> (usize, u64) {
        let offset = x - self.min;
        ((offset / BITS_PER_WORD) as usize, offset % BITS_PER_WORD)
    }

    pub fn get(&self, x: u64) -> Result<bool> {
        if !self.contains(x) {
            return Err(FileSystemError::BadParameter);
        }
        let (word, bit) = self.locate(x);
        Ok(self.words[word] & (1 << bit) != 0)
    }

    // 越界的值直接忽略
    pub fn set(&mut self, x: u64) {
        if self.contains(x) {
            let (word, bit) = self.locate(x);
            self.words[word] |= 1 << bit;
        }
    }

    pub fn clear(&mut self, x: u64) {
        if self.contains(x) {
            let (word, bit) = self.locate(x);
            self.words[word] &= !(1 << bit);
            if word < self.cursor {
                self.cursor = word;
            }
        }
    }

    /// 从游标所在的字开始寻找第一个空闲位，返回其值（不是偏移）
    pub fn find_next(&mut self) -> Result<u64> {
        for word in self.cursor..self.words.len() {
            let bits = self.words[word];
            if bits == u64::MAX {
                continue;
            }
            for bit in 0..BITS_PER_WORD {
                let x = self.min + word as u64 * BITS_PER_WORD + bit;
                if x > self.max {
                    break;
                }
                if bits & (1 << bit) == 0 {
                    self.cursor = word;
                    return Ok(x);
                }
            }
        }
        Err(FileSystemError::BitmapFull)
    }

    pub fn count_used(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }
}

impl fmt::Display for BitmapArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "**********BitMap Block START**********")?;
        writeln!(f, "length: {}", self.words.len())?;
        writeln!(f, "min: {}", self.min)?;
        writeln!(f, "max: {}", self.max)?;
        writeln!(f, "cursor: {}", self.cursor)?;
        writeln!(f, "content:")?;
        for (index, bits) in self.words.iter().enumerate() {
            write!(f, "{}: ", index)?;
            for bit in 0..BITS_PER_WORD {
                let x = self.min + index as u64 * BITS_PER_WORD + bit;
                let used = x <= self.max && bits & (1 << bit) != 0;
                write!(f, "{}", u8::from(used))?;
                if (bit + 1) % 8 == 0 {
                    write!(f, " ")?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "**********BitMap Block END************")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_bitmap_is_clear() {
        let bm = BitmapArray::new(4, 131).unwrap();
        for x in 4..=131 {
            assert!(!bm.get(x).unwrap());
        }
        assert!(matches!(bm.get(3), Err(FileSystemError::BadParameter)));
        assert!(matches!(bm.get(132), Err(FileSystemError::BadParameter)));
        assert_eq!(bm.count_used(), 0);
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(matches!(
            BitmapArray::new(10, 9),
            Err(FileSystemError::BadParameter)
        ));
        assert!(BitmapArray::new(7, 7).is_ok());
    }

    #[test]
    fn set_get_clear() {
        let mut bm = BitmapArray::new(4, 131).unwrap();
        for x in [4, 67, 68, 131] {
            bm.set(x);
            assert!(bm.get(x).unwrap());
            bm.clear(x);
            assert!(!bm.get(x).unwrap());
        }
    }

    #[test]
    fn out_of_range_set_is_ignored() {
        let mut bm = BitmapArray::new(4, 131).unwrap();
        bm.set(0);
        bm.set(1000);
        bm.clear(1000);
        assert_eq!(bm.count_used(), 0);
    }

    #[test]
    fn find_next_returns_values() {
        let mut bm = BitmapArray::new(4, 131).unwrap();
        assert_eq!(bm.find_next().unwrap(), 4);

        bm.set(4);
        bm.set(5);
        bm.set(6);
        assert_eq!(bm.find_next().unwrap(), 7);

        for x in (4..131).step_by(3) {
            bm.set(x);
        }
        assert_eq!(bm.find_next().unwrap(), 8);
    }

    #[test]
    fn find_next_skips_full_words() {
        let mut bm = BitmapArray::new(0, 199).unwrap();
        for x in 0..130 {
            bm.set(x);
        }
        assert_eq!(bm.find_next().unwrap(), 130);
        assert_eq!(bm.cursor(), 2);
    }

    #[test]
    fn clear_rewinds_cursor() {
        let mut bm = BitmapArray::new(0, 199).unwrap();
        for x in 0..150 {
            bm.set(x);
        }
        assert_eq!(bm.find_next().unwrap(), 150);
        assert_eq!(bm.cursor(), 2);

        bm.clear(10);
        assert_eq!(bm.cursor(), 0);
        assert_eq!(bm.find_next().unwrap(), 10);
    }

    #[test]
    fn full_bitmap() {
        let mut bm = BitmapArray::new(3, 70).unwrap();
        for x in 3..=70 {
            bm.set(x);
        }
        assert!(matches!(bm.find_next(), Err(FileSystemError::BitmapFull)));

        bm.clear(70);
        assert_eq!(bm.find_next().unwrap(), 70);
    }

    #[test]
    fn display_masks_bits_past_max() {
        let mut bm = BitmapArray::new(0, 9).unwrap();
        bm.set(0);
        bm.set(9);
        let dump = bm.to_string();
        assert!(dump.contains("0: 10000000 01000000 00000000"));
        assert!(dump.contains("cursor: 0"));
    }
}
