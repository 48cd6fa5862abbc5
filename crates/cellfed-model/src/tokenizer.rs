//! Token ids for the control-plane vocabulary.
//!
//! Id `0` is reserved for the beginning-of-sequence token; message tags
//! follow in [`EventTag::ALL`] order starting at `1`.

use cellfed_types::EventTag;

/// Beginning-of-sequence token.
pub const BOS: usize = 0;

/// Number of token ids, including [`BOS`].
pub const VOCAB_SIZE: usize = EventTag::ALL.len() + 1;

/// Token id of a message tag.
pub fn encode_tag(tag: EventTag) -> usize {
    tag.index().saturating_add(1)
}

/// Message tag for a token id; `None` for [`BOS`] and out-of-range ids.
pub fn decode_token(token: usize) -> Option<EventTag> {
    token.checked_sub(1).and_then(EventTag::from_index)
}

/// Token ids for a run of messages, without a leading [`BOS`].
pub fn encode(tags: &[EventTag]) -> Vec<usize> {
    tags.iter().copied().map(encode_tag).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_skip_bos() {
        let ids = encode(&EventTag::ALL);
        assert_eq!(ids, (1..VOCAB_SIZE).collect::<Vec<_>>());
        for tag in EventTag::ALL {
            assert_eq!(decode_token(encode_tag(tag)), Some(tag));
        }
        assert_eq!(decode_token(BOS), None);
        assert_eq!(decode_token(VOCAB_SIZE), None);
    }
}
