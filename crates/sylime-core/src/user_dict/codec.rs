//! Record format of the learning store.
//!
//! A record key is the entry's code string (each syllable followed by one
//! space), a tab, then the entry text. The value is a line of `k=v`
//! tokens separated by single spaces: `c=<commits> d=<dee> t=<tick>`.

/// Parsed form of one store value.
///
/// `commits` counts how often the entry was committed; a negative count
/// marks a deleted entry that keeps its magnitude so it can come back.
/// `dee` is the decaying commit mass and `tick` the age stamp both
/// relative to the store's global tick.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDbValue {
    pub commits: i32,
    pub dee: f64,
    pub tick: u64,
}

impl Default for UserDbValue {
    fn default() -> Self {
        Self {
            commits: 0,
            dee: 0.0,
            tick: 0,
        }
    }
}

impl UserDbValue {
    pub fn pack(&self) -> String {
        format!("c={} d={} t={}", self.commits, self.dee, self.tick)
    }

    /// Parse a stored value. Tokens without `=` are skipped and unknown
    /// keys are ignored; a malformed number fails the whole parse.
    /// `dee` is capped at 10000 on the way in.
    pub fn unpack(value: &str) -> Option<Self> {
        let mut v = Self::default();
        for token in value.split(' ') {
            let Some((key, raw)) = token.split_once('=') else {
                continue;
            };
            match key {
                "c" => v.commits = raw.parse().ok()?,
                "d" => v.dee = raw.parse::<f64>().ok()?.min(10000.0),
                "t" => v.tick = raw.parse().ok()?,
                _ => {}
            }
        }
        Some(v)
    }
}

/// Split a record key into its code part and text. The code part keeps
/// its trailing space. Keys without a tab are not entry records.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let tab = key.find('\t')?;
    Some((&key[..tab], &key[tab + 1..]))
}

pub fn build_key(code: &str, text: &str) -> String {
    format!("{code}\t{text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unpack_reads_known_keys() {
        let v = UserDbValue::unpack("c=3 d=0.5 t=42").unwrap();
        assert_eq!(v.commits, 3);
        assert_eq!(v.dee, 0.5);
        assert_eq!(v.tick, 42);
    }

    #[test]
    fn unpack_skips_junk_and_unknown_keys() {
        let v = UserDbValue::unpack("noise c=2 x=9 t=7").unwrap();
        assert_eq!(v.commits, 2);
        assert_eq!(v.dee, 0.0);
        assert_eq!(v.tick, 7);
    }

    #[test]
    fn unpack_caps_dee() {
        let v = UserDbValue::unpack("c=1 d=123456.0 t=1").unwrap();
        assert_eq!(v.dee, 10000.0);
    }

    #[test]
    fn unpack_rejects_malformed_numbers() {
        assert_eq!(UserDbValue::unpack("c=abc d=0.5 t=1"), None);
        assert_eq!(UserDbValue::unpack("c=1 d=0.5 t=-1"), None);
    }

    #[test]
    fn split_key_keeps_trailing_space() {
        let (code, text) = split_key("ni hao \tNiHao").unwrap();
        assert_eq!(code, "ni hao ");
        assert_eq!(text, "NiHao");
        assert_eq!(split_key("/tick"), None);
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trips(
            commits in -1000i32..1000,
            dee in 0.0f64..10000.0,
            tick in 0u64..1_000_000,
        ) {
            let v = UserDbValue { commits, dee, tick };
            prop_assert_eq!(UserDbValue::unpack(&v.pack()), Some(v));
        }
    }
}
