const KATAKANA: std::ops::RangeInclusive<u32> = 0x30A0..=0x30FF;
const HIRAGANA: std::ops::RangeInclusive<u32> = 0x3040..=0x309F;

/// True when every scalar is in the Katakana block. Vacuously true for "".
pub fn is_katakana(value: &str) -> bool {
    value.chars().all(|ch| KATAKANA.contains(&(ch as u32)))
}

/// True when every scalar is in the Hiragana block. Vacuously true for "".
pub fn is_hiragana(value: &str) -> bool {
    value.chars().all(|ch| HIRAGANA.contains(&(ch as u32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_kana_blocks() {
        assert!(is_katakana("テレビ"));
        assert!(is_katakana("ー"));
        assert!(!is_katakana("テレビ局"));
        assert!(is_hiragana("ねこ"));
        assert!(!is_hiragana("ネコ"));
        assert!(!is_hiragana("ねこ猫"));
        assert!(is_katakana(""));
        assert!(is_hiragana(""));
    }
}
