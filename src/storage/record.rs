//! Fixed-width row stored as a leaf cell's value.
//!
//! Layout is C-style: each string field is a null-terminated buffer one byte
//! longer than its maximum payload, and the full field width is always
//! copied (never a `strncpy`-style copy bounded by the source length) so
//! that trailing bytes are deterministic on both the encode and decode
//! paths.
use crate::errors::Error;

pub const USERNAME_MAX_LEN: usize = 32;
pub const EMAIL_MAX_LEN: usize = 255;

const USERNAME_SIZE: usize = USERNAME_MAX_LEN + 1;
const EMAIL_SIZE: usize = EMAIL_MAX_LEN + 1;

const ID_OFFSET: usize = 0;
const ID_SIZE: usize = 4;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Sum of field widths, not a padded in-memory `sizeof`: 4 + 33 + 256.
pub const RECORD_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Record {
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Result<Self, Error> {
        let username = username.into();
        let email = email.into();
        if username.len() > USERNAME_MAX_LEN || email.len() > EMAIL_MAX_LEN {
            return Err(Error::StringTooLong);
        }
        Ok(Record { id, username, email })
    }

    /// Serializes the record into a cell's value area, exactly `RECORD_SIZE`
    /// bytes wide.
    pub fn encode(&self) -> Result<[u8; RECORD_SIZE], Error> {
        if self.username.len() > USERNAME_MAX_LEN || self.email.len() > EMAIL_MAX_LEN {
            return Err(Error::StringTooLong);
        }

        let mut buf = [0u8; RECORD_SIZE];
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());

        let mut username_field = [0u8; USERNAME_SIZE];
        username_field[..self.username.len()].copy_from_slice(self.username.as_bytes());
        buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].copy_from_slice(&username_field);

        let mut email_field = [0u8; EMAIL_SIZE];
        email_field[..self.email.len()].copy_from_slice(self.email.as_bytes());
        buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].copy_from_slice(&email_field);

        Ok(buf)
    }

    /// Deserializes a record from a cell's value area. `buf` must be exactly
    /// `RECORD_SIZE` bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != RECORD_SIZE {
            return Err(crate::err!(
                Storage,
                "record buffer size mismatch: expected {}, got {}",
                RECORD_SIZE,
                buf.len()
            ));
        }

        let id = u32::from_le_bytes(buf[ID_OFFSET..ID_OFFSET + ID_SIZE].try_into().unwrap());
        let username = decode_cstr(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let email = decode_cstr(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);

        Ok(Record { id, username, email })
    }
}

fn decode_cstr(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
