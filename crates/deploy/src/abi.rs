//! Constructor argument encoding.
//!
//! Arguments are appended to the creation bytecode using the standard head/tail layout:
//! static values occupy one 32-byte head word, strings store an offset in the head and
//! their length-prefixed, zero-padded bytes in the tail.

use alloy_core::primitives::U256;

use crate::AbiValue;

const WORD: usize = 32;

/// ABI-encode constructor arguments.
pub fn encode_constructor_args(args: &[AbiValue]) -> Vec<u8> {
    let head_len = args.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for arg in args {
        match arg {
            AbiValue::Address(address) => head.extend_from_slice(address.into_word().as_slice()),
            AbiValue::Uint(value) => head.extend_from_slice(&value.to_be_bytes::<32>()),
            AbiValue::Bool(value) => {
                head.extend_from_slice(&U256::from(u8::from(*value)).to_be_bytes::<32>())
            }
            AbiValue::Bytes32(value) => head.extend_from_slice(value.as_slice()),
            AbiValue::String(value) => {
                let offset = head_len + tail.len();
                head.extend_from_slice(&U256::from(offset).to_be_bytes::<32>());
                tail.extend_from_slice(&U256::from(value.len()).to_be_bytes::<32>());
                tail.extend_from_slice(value.as_bytes());
                tail.resize(tail.len() + padding(value.len()), 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

fn padding(len: usize) -> usize {
    (WORD - len % WORD) % WORD
}
