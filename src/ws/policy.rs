//! Per-connection configuration shared by the generator and the parser.

use crate::ws::Error;

/// Default limit, in bytes, for every size in a [`Policy`].
pub const DEFAULT_MAX_SIZE: u64 = 65536;

/// Which end of the connection this policy is for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Client,
    Server,
}

/// How far frames are checked against the protocol.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Validation {
    /// Reject frames that break the framing rules.
    #[default]
    Strict,
    /// Pass frames through as they are. Role based masking and size limits still apply
    /// when parsing.
    Lax,
}

/// Role, size limits and validation mode of one connection.
///
/// ```
/// use wsframe::ws::{Policy, Role, Validation};
///
/// let policy = Policy::server()
///     .with_max_text_message_size(1024)
///     .with_validation(Validation::Lax);
/// assert_eq!(Role::Server, policy.role());
/// assert!(policy.expects_masked_input());
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Policy {
    role: Role,
    max_text_message_size: u64,
    max_binary_message_size: u64,
    max_frame_payload_size: u64,
    validation: Validation,
}

impl Policy {
    pub const fn new(role: Role) -> Policy {
        Self {
            role,
            max_text_message_size: DEFAULT_MAX_SIZE,
            max_binary_message_size: DEFAULT_MAX_SIZE,
            max_frame_payload_size: DEFAULT_MAX_SIZE,
            validation: Validation::Strict,
        }
    }

    pub const fn client() -> Policy {
        Self::new(Role::Client)
    }

    pub const fn server() -> Policy {
        Self::new(Role::Server)
    }

    pub fn with_max_text_message_size(self, max_text_message_size: u64) -> Policy {
        Self {
            max_text_message_size,
            ..self
        }
    }

    pub fn with_max_binary_message_size(self, max_binary_message_size: u64) -> Policy {
        Self {
            max_binary_message_size,
            ..self
        }
    }

    pub fn with_max_frame_payload_size(self, max_frame_payload_size: u64) -> Policy {
        Self {
            max_frame_payload_size,
            ..self
        }
    }

    pub fn with_validation(self, validation: Validation) -> Policy {
        Self { validation, ..self }
    }

    /// Shorthand for `with_validation(Validation::Lax)`.
    pub fn lax(self) -> Policy {
        self.with_validation(Validation::Lax)
    }

    /// Same limits and validation for the other role.
    pub fn with_role(self, role: Role) -> Policy {
        Self { role, ..self }
    }

    #[inline]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub const fn max_text_message_size(&self) -> u64 {
        self.max_text_message_size
    }

    #[inline]
    pub const fn max_binary_message_size(&self) -> u64 {
        self.max_binary_message_size
    }

    #[inline]
    pub const fn max_frame_payload_size(&self) -> u64 {
        self.max_frame_payload_size
    }

    #[inline]
    pub const fn validation(&self) -> Validation {
        self.validation
    }

    #[inline]
    pub const fn is_strict(&self) -> bool {
        matches!(self.validation, Validation::Strict)
    }

    /// Servers receive masked frames, clients unmasked ones.
    #[inline]
    pub const fn expects_masked_input(&self) -> bool {
        matches!(self.role, Role::Server)
    }

    /// Clients send masked frames, servers unmasked ones.
    #[inline]
    pub const fn expects_masked_output(&self) -> bool {
        matches!(self.role, Role::Client)
    }

    pub fn assert_valid_frame_payload_size(&self, size: u64) -> Result<(), Error> {
        check_limit(size, self.max_frame_payload_size).map_err(|(size, limit)| Error::FrameTooLarge { size, limit })
    }

    pub fn assert_valid_text_message_size(&self, size: u64) -> Result<(), Error> {
        check_limit(size, self.max_text_message_size).map_err(|(size, limit)| Error::MessageTooLarge { size, limit })
    }

    pub fn assert_valid_binary_message_size(&self, size: u64) -> Result<(), Error> {
        check_limit(size, self.max_binary_message_size).map_err(|(size, limit)| Error::MessageTooLarge { size, limit })
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::server()
    }
}

#[inline]
const fn check_limit(size: u64, limit: u64) -> Result<(), (u64, u64)> {
    if size > limit {
        return Err((size, limit));
    }
    Ok(())
}
