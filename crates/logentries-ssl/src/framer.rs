// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Size-bounded wire framing.
//!
//! The intake reads one line per event, prefixed with the destination token:
//!
//! ```text
//!   <token> <data> \n
//! ```
//!
//! Lines longer than the payload ceiling are split into several lines. Every
//! piece carries the token and terminator again so the intake treats it as a
//! standalone fragment. Pieces are cut on byte counts, backing off to the
//! previous UTF-8 character boundary so no character is torn in half.

use crate::constants::FRAME_OVERHEAD;
use crate::error::FrameError;

/// Longest encoding of a single UTF-8 character.
const MAX_CHAR_LEN: usize = 4;

/// A single framed line, written to the connection in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    fn new(token: &str, data: &str) -> Self {
        let mut bytes = Vec::with_capacity(token.len() + data.len() + FRAME_OVERHEAD);
        bytes.extend_from_slice(token.as_bytes());
        bytes.push(b' ');
        bytes.extend_from_slice(data.as_bytes());
        bytes.extend_from_slice(b" \n");
        Payload(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadFramer {
    max_size: usize,
}

impl PayloadFramer {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Bytes of record data that fit in one payload next to `token`.
    fn capacity(&self, token: &str) -> Result<usize, FrameError> {
        self.max_size
            .checked_sub(token.len() + FRAME_OVERHEAD)
            .ok_or(FrameError::TokenTooLong {
                token_len: token.len(),
                max_size: self.max_size,
            })
    }

    /// Checks that any body can be framed with `token`, splitting if needed.
    pub fn check_token(&self, token: &str) -> Result<(), FrameError> {
        let capacity = self.capacity(token)?;
        if capacity < MAX_CHAR_LEN {
            return Err(FrameError::CapacityTooSmall {
                capacity,
                max_size: self.max_size,
            });
        }
        Ok(())
    }

    /// Frames `body` into one or more payloads of at most `max_size` bytes each.
    ///
    /// An empty body still yields one payload. Concatenating the data part of
    /// every payload, in order, gives back `body` exactly.
    pub fn frame(&self, token: &str, body: &str) -> Result<Vec<Payload>, FrameError> {
        let capacity = self.capacity(token)?;
        if body.len() <= capacity {
            return Ok(vec![Payload::new(token, body)]);
        }
        self.check_token(token)?;

        let mut payloads = Vec::with_capacity(body.len().div_ceil(capacity));
        let mut rest = body;
        while !rest.is_empty() {
            let mut end = rest.len().min(capacity);
            // capacity >= MAX_CHAR_LEN, so a boundary exists in (0, end]
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            let (piece, tail) = rest.split_at(end);
            payloads.push(Payload::new(token, piece));
            rest = tail;
        }
        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_SIZE;
    use proptest::prelude::*;

    /// Strips the `<token> ` prefix and ` \n` terminator off a payload.
    fn data_of<'a>(token: &str, payload: &'a Payload) -> &'a str {
        let bytes = payload.as_bytes();
        assert!(bytes.starts_with(token.as_bytes()));
        assert!(bytes.ends_with(b" \n"));
        std::str::from_utf8(&bytes[token.len() + 1..bytes.len() - 2]).expect("torn utf-8")
    }

    fn reassemble(token: &str, payloads: &[Payload]) -> String {
        payloads.iter().map(|p| data_of(token, p)).collect()
    }

    #[test]
    fn test_single_payload() {
        let framer = PayloadFramer::new(MAX_SIZE);
        let payloads = framer.frame("tok1", r#"{"message":"Hello"}"#).unwrap();

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].as_bytes(), b"tok1 {\"message\":\"Hello\"} \n");
    }

    #[test]
    fn test_empty_body() {
        let framer = PayloadFramer::new(MAX_SIZE);
        let payloads = framer.frame("tok", "").unwrap();

        assert_eq!(payloads, vec![Payload(b"tok  \n".to_vec())]);
    }

    #[test]
    fn test_exact_fit_is_not_split() {
        // 3 (token) + 3 (framing) + 10 (body)
        let framer = PayloadFramer::new(16);
        let payloads = framer.frame("tok", "0123456789").unwrap();

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].len(), 16);
    }

    #[test]
    fn test_two_chunks_in_order() {
        let framer = PayloadFramer::new(16);
        let payloads = framer.frame("tok", "0123456789abcdef").unwrap();

        assert_eq!(
            payloads,
            vec![
                Payload(b"tok 0123456789 \n".to_vec()),
                Payload(b"tok abcdef \n".to_vec()),
            ]
        );
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let framer = PayloadFramer::new(16);
        let payloads = framer.frame("tok", &"x".repeat(30)).unwrap();

        assert_eq!(payloads.len(), 3);
        assert!(payloads.iter().all(|p| p.len() == 16));
    }

    #[test]
    fn test_too_large_event_is_split_in_two() {
        let framer = PayloadFramer::new(MAX_SIZE);
        let body = format!(r#"{{"hello":"{}"}}"#, "a".repeat(MAX_SIZE + 100));
        let payloads = framer.frame("token", &body).unwrap();

        assert_eq!(payloads.len(), 2);
        assert!(payloads.iter().all(|p| p.len() <= MAX_SIZE));
        assert_eq!(reassemble("token", &payloads), body);
    }

    #[test]
    fn test_split_never_tears_multibyte_characters() {
        // capacity 5: "é" is 2 bytes, so a cut after 5 bytes would land mid-character
        let framer = PayloadFramer::new(11);
        let body = "ééé";
        let payloads = framer.frame("abc", body).unwrap();

        assert_eq!(payloads.len(), 2);
        assert_eq!(data_of("abc", &payloads[0]), "éé");
        assert_eq!(data_of("abc", &payloads[1]), "é");
        assert_eq!(reassemble("abc", &payloads), body);
    }

    #[test]
    fn test_token_too_long() {
        let framer = PayloadFramer::new(8);
        assert_eq!(
            framer.frame("0123456789", "x"),
            Err(FrameError::TokenTooLong {
                token_len: 10,
                max_size: 8
            })
        );
        assert!(framer.check_token("0123456789").is_err());
    }

    #[test]
    fn test_capacity_too_small_only_matters_when_splitting() {
        // capacity 2
        let framer = PayloadFramer::new(8);
        assert_eq!(framer.frame("abc", "xy").unwrap().len(), 1);
        assert_eq!(
            framer.frame("abc", "xyz"),
            Err(FrameError::CapacityTooSmall {
                capacity: 2,
                max_size: 8
            })
        );
    }

    proptest! {
        #[test]
        fn frames_reassemble_to_body(body in "\\PC{0,300}", max_size in 20usize..120) {
            let framer = PayloadFramer::new(max_size);
            let payloads = framer.frame("tok-123", &body).unwrap();

            prop_assert!(!payloads.is_empty());
            prop_assert!(payloads.iter().all(|p| p.len() <= max_size));
            prop_assert_eq!(reassemble("tok-123", &payloads), body.clone());

            let fits = "tok-123".len() + FRAME_OVERHEAD + body.len() <= max_size;
            prop_assert_eq!(payloads.len() == 1, fits);
        }
    }
}
