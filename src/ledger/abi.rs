//! Contract ABI codec
//!
//! Solidity ABI encoding for the small set of types the notes/tasks
//! contract uses: `string`, `bool`, `uint256` (fitting in 64 bits) and
//! `string[]`. Calls are `selector ++ head ++ tail`; dynamic values sit in
//! the tail and are referenced by offsets in the head.

use sha3::{Digest, Keccak256};

use super::error::ContractError;
use super::types::{Note, Task, TaskStatus};

/// Selector of the standard `Error(string)` revert payload
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

const WORD: usize = 32;

/// Function signatures of the deployed contract
pub mod methods {
    pub const REGISTER: &str = "register()";
    pub const CREATE_NOTE: &str = "createNote(string,string,string)";
    pub const UPDATE_NOTE: &str = "updateNote(string,string,string)";
    pub const ADD_ATTACHMENT_TO_NOTE: &str = "addAttachmentToNote(string,string)";
    pub const DELETE_NOTE: &str = "deleteNote(string)";
    pub const GET_NOTE_IDS: &str = "getNoteIds()";
    pub const GET_NOTE: &str = "getNote(string)";
    pub const CREATE_TASK: &str = "createTask(string,string,string,string)";
    pub const UPDATE_TASK: &str = "updateTask(string,string,string,bool,string)";
    pub const DELETE_TASK: &str = "deleteTask(string)";
    pub const GET_TASK_IDS: &str = "getTaskIds()";
    pub const GET_TASK: &str = "getTask(string)";
}

/// `getNote` return tuple
pub const NOTE_OUTPUTS: &[ParamType] = &[
    ParamType::String,
    ParamType::String,
    ParamType::String,
    ParamType::StringArray,
    ParamType::Uint,
    ParamType::Uint,
];

/// `getTask` return tuple
pub const TASK_OUTPUTS: &[ParamType] = &[
    ParamType::String,
    ParamType::String,
    ParamType::String,
    ParamType::Bool,
    ParamType::String,
    ParamType::Uint,
    ParamType::Uint,
];

/// An ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    String(String),
    Bool(bool),
    Uint(u64),
    StringArray(Vec<String>),
}

/// An ABI type to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Bool,
    Uint,
    StringArray,
}

impl Token {
    pub fn string(value: impl Into<String>) -> Self {
        Token::String(value.into())
    }

    pub fn into_string(self) -> Result<String, ContractError> {
        match self {
            Token::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }

    pub fn into_bool(self) -> Result<bool, ContractError> {
        match self {
            Token::Bool(b) => Ok(b),
            other => Err(unexpected("bool", &other)),
        }
    }

    pub fn into_uint(self) -> Result<u64, ContractError> {
        match self {
            Token::Uint(v) => Ok(v),
            other => Err(unexpected("uint256", &other)),
        }
    }

    pub fn into_string_array(self) -> Result<Vec<String>, ContractError> {
        match self {
            Token::StringArray(items) => Ok(items),
            other => Err(unexpected("string[]", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &Token) -> ContractError {
    ContractError::Decode(format!("expected {}, got {:?}", expected, got))
}

/// First four bytes of the Keccak-256 hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for `signature` with `tokens` as arguments
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode(tokens));
    out
}

/// Encode a tuple of values
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = WORD * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Bool(b) => head.extend_from_slice(&uint_word(*b as u64)),
            Token::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Token::String(s) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend(encode_bytes(s.as_bytes()));
            }
            Token::StringArray(items) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                let mut encoded = uint_word(items.len() as u64).to_vec();
                let elements: Vec<Token> = items.iter().map(|s| Token::string(s.as_str())).collect();
                encoded.extend(encode(&elements));
                tail.extend(encoded);
            }
        }
    }

    head.extend(tail);
    head
}

/// Decode a tuple of values
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, ContractError> {
    decode_at(types, data, 0)
}

fn decode_at(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Token>, ContractError> {
    let mut tokens = Vec::with_capacity(types.len());

    for (i, ty) in types.iter().enumerate() {
        let word = read_word(data, base + i * WORD)?;
        let token = match ty {
            ParamType::Bool => match word_to_u64(word)? {
                0 => Token::Bool(false),
                1 => Token::Bool(true),
                v => return Err(ContractError::Decode(format!("invalid bool {}", v))),
            },
            ParamType::Uint => Token::Uint(word_to_u64(word)?),
            ParamType::String => {
                let offset = checked_offset(base, word)?;
                Token::String(decode_string(data, offset)?)
            }
            ParamType::StringArray => {
                let offset = checked_offset(base, word)?;
                let len = word_to_usize(read_word(data, offset)?)?;
                if len > data.len() / WORD {
                    return Err(ContractError::Decode(format!("array length {} too large", len)));
                }
                let element_types = vec![ParamType::String; len];
                let items = decode_at(&element_types, data, offset + WORD)?
                    .into_iter()
                    .map(Token::into_string)
                    .collect::<Result<Vec<_>, _>>()?;
                Token::StringArray(items)
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn decode_string(data: &[u8], offset: usize) -> Result<String, ContractError> {
    let len = word_to_usize(read_word(data, offset)?)?;
    let start = offset + WORD;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| ContractError::Decode("string runs past end of data".to_string()))?;
    String::from_utf8(data[start..end].to_vec())
        .map_err(|e| ContractError::Decode(format!("invalid utf-8: {}", e)))
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = uint_word(bytes.len() as u64).to_vec();
    out.extend_from_slice(bytes);
    let pad = (WORD - bytes.len() % WORD) % WORD;
    out.resize(out.len() + pad, 0);
    out
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], ContractError> {
    at.checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| ContractError::Decode(format!("truncated data at byte {}", at)))
}

fn word_to_u64(word: &[u8]) -> Result<u64, ContractError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(ContractError::Decode("uint256 exceeds 64 bits".to_string()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(bytes))
}

fn word_to_usize(word: &[u8]) -> Result<usize, ContractError> {
    usize::try_from(word_to_u64(word)?)
        .map_err(|_| ContractError::Decode("offset exceeds address space".to_string()))
}

fn checked_offset(base: usize, word: &[u8]) -> Result<usize, ContractError> {
    base.checked_add(word_to_usize(word)?)
        .ok_or_else(|| ContractError::Decode("offset overflow".to_string()))
}

/// Decode a `getNote` reply
pub fn decode_note(data: &[u8]) -> Result<Note, ContractError> {
    let mut tokens = decode(NOTE_OUTPUTS, data)?.into_iter();
    let mut next = || {
        tokens
            .next()
            .ok_or_else(|| ContractError::Decode("missing note field".to_string()))
    };

    Ok(Note {
        id: next()?.into_string()?,
        title: next()?.into_string()?,
        content: next()?.into_string()?,
        attachments: next()?.into_string_array()?,
        created_at: to_timestamp(next()?.into_uint()?)?,
        updated_at: to_timestamp(next()?.into_uint()?)?,
    })
}

/// Decode a `getTask` reply
pub fn decode_task(data: &[u8]) -> Result<Task, ContractError> {
    let mut tokens = decode(TASK_OUTPUTS, data)?.into_iter();
    let mut next = || {
        tokens
            .next()
            .ok_or_else(|| ContractError::Decode("missing task field".to_string()))
    };

    let id = next()?.into_string()?;
    let title = next()?.into_string()?;
    let description = next()?.into_string()?;
    let completed = next()?.into_bool()?;
    let status = next()?
        .into_string()?
        .parse::<TaskStatus>()
        .map_err(ContractError::Decode)?;

    Ok(Task {
        id,
        title,
        description,
        completed,
        status,
        created_at: to_timestamp(next()?.into_uint()?)?,
        updated_at: to_timestamp(next()?.into_uint()?)?,
    })
}

/// Decode a `string[]` reply
pub fn decode_string_array(data: &[u8]) -> Result<Vec<String>, ContractError> {
    decode(&[ParamType::StringArray], data)?
        .pop()
        .ok_or_else(|| ContractError::Decode("empty reply".to_string()))?
        .into_string_array()
}

fn to_timestamp(value: u64) -> Result<i64, ContractError> {
    i64::try_from(value).map_err(|_| ContractError::Decode(format!("timestamp {} out of range", value)))
}

/// Reason string of an `Error(string)` revert payload
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_SELECTOR {
        return None;
    }
    decode(&[ParamType::String], &data[4..])
        .ok()?
        .pop()?
        .into_string()
        .ok()
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse `0x`-prefixed (or bare) hex
pub fn from_hex(value: &str) -> Result<Vec<u8>, ContractError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| ContractError::Decode(format!("invalid hex: {}", e)))
}
