//! A generic "serialise only the entries visible to this observer" helper.
//!
//! Grounded on the original `slice/slice.go`'s `VisibleCheckerMap` /
//! `MarshalMapAsSliceJSON`: rather than building an intermediate `Vec` of
//! visible entries before serialising, this walks the source once and
//! writes a JSON array directly, skipping anything the predicate rejects.

use serde::{Serialize, Serializer};

/// Serialise `items` as a JSON array, skipping any entry for which
/// `is_visible` returns false.
pub fn serialize_filtered<'a, S, T, I, F>(
    items: I,
    is_visible: F,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> bool,
{
    serializer.collect_seq(items.into_iter().filter(|item| is_visible(item)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Item {
        id: i64,
        hidden: bool,
    }

    struct Wrapper<'a>(&'a Vec<Item>);
    impl<'a> Serialize for Wrapper<'a> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serialize_filtered(self.0.iter(), |i| !i.hidden, serializer)
        }
    }

    #[test]
    fn filters_hidden_entries() {
        let items = vec![
            Item { id: 1, hidden: false },
            Item { id: 2, hidden: true },
            Item { id: 3, hidden: false },
        ];

        let encoded = serde_json::to_string(&Wrapper(&items)).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["id"], 1);
        assert_eq!(parsed[1]["id"], 3);
    }
}
