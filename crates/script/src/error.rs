//! The script interpreter's error taxonomy.

use thiserror::Error;

/// Every way a script program can fail to validate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// A push opcode declared a length that ran past the end of the script.
    #[error("push data size exceeds remaining script bytes")]
    InvalidPushDataSize,
    /// More than 201 counted opcodes were executed.
    #[error("operation count exceeds the per-script limit")]
    InvalidOperationCount,
    /// Main stack plus alt stack exceeded 1000 entries.
    #[error("combined stack size exceeds 1000 entries")]
    InvalidStackSize,
    /// `if`/`notif`/`else`/`endif` nesting was left unbalanced.
    #[error("conditional stack left unbalanced at end of script")]
    InvalidStackScope,
    /// The script ran to completion but left a falsy value on top.
    #[error("script evaluated to a false top stack value")]
    StackFalse,
    /// A specific opcode's own precondition failed (bad argument count,
    /// arithmetic range, disabled opcode, etc). Carries the opcode's name.
    #[error("operation {0} failed")]
    OpFailed(&'static str),
    /// A signature was not validly DER/compact encoded (or failed
    /// BIP66/low-S strictness under the active flags).
    #[error("invalid signature encoding")]
    InvalidSignatureEncoding,
    /// `NULLFAIL`: a non-empty signature failed verification.
    #[error("signature failed verification under NULLFAIL")]
    IncorrectSignature,
    /// A witness program's stack did not match the shape its version/size
    /// requires (wrong item count, bad control block length, …).
    #[error("invalid witness program")]
    InvalidWitness,
    /// A witness carried extra items execution did not consume.
    #[error("witness left unconsumed items")]
    DirtyWitness,
    /// A witness was present on an input that forbids one, or absent where
    /// required.
    #[error("witness present/absent where forbidden/required")]
    UnexpectedWitness,
    /// A P2SH or P2WSH redeem/witness script did not match its committed
    /// hash.
    #[error("embedded script does not match its committed hash")]
    InvalidScriptEmbed,
}
