//! The opcode dispatch loop.
//!
//! [`Program::run`] walks a script's operations against a [`Stack`],
//! evaluating push data, flow control, stack manipulation, arithmetic, and
//! the cryptographic opcodes. Signature opcodes call back into
//! [`crate::sighash`] and `satoshi-ec` for the actual hash/verify work; this
//! module only owns the stack machine itself.

use crate::error::ScriptError;
use crate::opcodes::*;
use crate::sighash::{SighashCache, TapscriptExtension, SIGHASH_ALL, SIGHASH_DEFAULT};
use crate::stack::{decode_script_number, Stack};
use satoshi_chain::{Operation, Output, Script};
use satoshi_core::hashes::{hash160, hash256, ripemd160, sha1, sha256};
use satoshi_core::Hash32;

/// Per-script execution budget: more than this many counted opcodes fails
/// the script. Pushes don't count; everything else does.
const MAX_OPERATION_COUNT: usize = 201;

/// Which of the four signature algorithms `OP_CHECKSIG`/`OP_CHECKMULTISIG`
/// in this program use.
pub enum ExecutionMode<'a> {
    /// Pre-SegWit scripts: legacy sighash, DER signatures, no `NULLFAIL`.
    Legacy,
    /// BIP141/BIP143 witness v0 programs.
    SegwitV0 {
        /// The value (in satoshis) of the output being spent, folded into
        /// the BIP143 sighash.
        value: u64,
    },
    /// BIP341/342 tapscript.
    Tapscript {
        /// `tapleaf_hash` of the script currently executing.
        leaf_hash: Hash32,
        /// The stripped annex, if the witness carried one.
        annex: Option<&'a [u8]>,
    },
}

/// Everything a running program needs beyond its own script and stack.
pub struct VerifyContext<'a> {
    /// Transaction-wide sighash memoization.
    pub sighash_cache: &'a SighashCache<'a>,
    /// The outputs spent by every input of the enclosing transaction.
    pub prevouts: &'a [Output],
    /// Which input this script belongs to.
    pub input_index: usize,
    /// The enclosing transaction's version (BIP68/CSV needs `>= 2`).
    pub tx_version: u32,
    /// The enclosing transaction's locktime.
    pub tx_locktime: u32,
    /// This input's sequence field.
    pub input_sequence: u32,
    /// Which of the four sighash algorithms applies.
    pub mode: ExecutionMode<'a>,
}

/// A running script program.
pub struct Program<'a, 'ctx> {
    stack: Stack,
    raw: &'a [u8],
    pos: usize,
    code_separator_offset: usize,
    last_code_separator_pos: u32,
    conditional: Vec<bool>,
    op_count: usize,
    op_success: bool,
    context: &'ctx VerifyContext<'ctx>,
}

impl<'a, 'ctx> Program<'a, 'ctx> {
    /// Start a new program over `script`, continuing from an existing
    /// stack (so a scriptSig's results flow into the scriptPubKey, and a
    /// witness stack flows into a witness/tapscript program).
    pub fn new(script: &'a Script, stack: Stack, context: &'ctx VerifyContext<'ctx>) -> Self {
        Self {
            stack,
            raw: script.as_bytes(),
            pos: 0,
            code_separator_offset: 0,
            last_code_separator_pos: 0xffff_ffff,
            conditional: Vec::new(),
            op_count: 0,
            op_success: false,
            context,
        }
    }

    /// Consume the program, returning its final stack.
    pub fn into_stack(self) -> Stack {
        self.stack
    }

    /// True if a BIP342 `OP_SUCCESSx` opcode was encountered, which makes
    /// evaluation succeed unconditionally regardless of the stack's final
    /// contents.
    pub fn op_success(&self) -> bool {
        self.op_success
    }

    fn executing(&self) -> bool {
        self.conditional.iter().all(|&b| b)
    }

    fn script_code(&self) -> Script {
        Script::new(self.raw[self.code_separator_offset..].to_vec())
    }

    /// Run every operation in the script to completion.
    pub fn run(&mut self) -> Result<(), ScriptError> {
        while self.pos < self.raw.len() {
            let op_start = self.pos;
            let op = self.next_operation()?;
            // BIP342: encountering an OP_SUCCESSx opcode makes the whole
            // tapscript succeed unconditionally, even if it sits inside an
            // unexecuted conditional branch or isn't the only opcode.
            if matches!(self.context.mode, ExecutionMode::Tapscript { .. })
                && op.data.is_none()
                && is_op_success(op.opcode)
            {
                self.op_success = true;
                return Ok(());
            }
            self.step(op, op_start)?;
        }
        if !self.conditional.is_empty() {
            return Err(ScriptError::InvalidStackScope);
        }
        Ok(())
    }

    /// True if the script left exactly one truthy item on the stack, the
    /// "clean stack" condition required of a top-level scriptPubKey/witness
    /// program (but not of an intermediate P2SH/P2WSH redeem script, whose
    /// caller re-pushes the redeem script itself afterward), or if a BIP342
    /// `OP_SUCCESSx` opcode made evaluation succeed unconditionally.
    pub fn succeeded(&self) -> bool {
        self.op_success || (self.stack.len() == 1 && self.stack.peek_bool().unwrap_or(false))
    }

    fn next_operation(&mut self) -> Result<Operation, ScriptError> {
        let opcode = self.raw[self.pos];
        self.pos += 1;
        let data = match opcode {
            0x00..=0x4b => Some(self.take(opcode as usize)?),
            OP_PUSHDATA1 => {
                let len = self.take(1)?[0] as usize;
                Some(self.take(len)?)
            }
            OP_PUSHDATA2 => {
                let bytes = self.take(2)?;
                let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
                Some(self.take(len)?)
            }
            OP_PUSHDATA4 => {
                let bytes = self.take(4)?;
                let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
                Some(self.take(len)?)
            }
            _ => None,
        };
        Ok(Operation {
            opcode,
            data,
            overflowed: false,
        })
    }

    fn take(&mut self, n: usize) -> Result<Vec<u8>, ScriptError> {
        if self.pos + n > self.raw.len() {
            return Err(ScriptError::InvalidPushDataSize);
        }
        let slice = self.raw[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(slice)
    }

    fn count_op(&mut self) -> Result<(), ScriptError> {
        self.op_count += 1;
        if self.op_count > MAX_OPERATION_COUNT {
            Err(ScriptError::InvalidOperationCount)
        } else {
            Ok(())
        }
    }

    fn step(&mut self, op: Operation, op_start: usize) -> Result<(), ScriptError> {
        // Push-data size, the disabled-opcode list, and the op-count budget
        // are all checked before the conditional-execution gate below: a
        // never-taken `OP_IF` branch doesn't exempt an oversized push, a
        // disabled opcode, or the 201-op limit, matching real consensus
        // (interpreter.cpp checks all three unconditionally, a holdover
        // from CVE-2010-5137's fix).
        if let Some(data) = &op.data {
            if data.len() > 520 {
                return Err(ScriptError::InvalidPushDataSize);
            }
            if self.executing() {
                self.stack.push(data.clone())?;
            }
            return Ok(());
        }

        self.count_op()?;

        if matches!(
            op.opcode,
            OP_CAT
                | OP_SUBSTR
                | OP_LEFT
                | OP_RIGHT
                | OP_INVERT
                | OP_AND
                | OP_OR
                | OP_XOR
                | OP_LSHIFT
                | OP_RSHIFT
                | OP_2MUL
                | OP_2DIV
                | OP_MUL
                | OP_DIV
                | OP_MOD
        ) {
            return Err(ScriptError::OpFailed("DISABLED"));
        }

        // OP_IF..OP_ENDIF run even while not executing, so the conditional
        // stack stays balanced; OP_VERIF/OP_VERNOTIF share that opcode range
        // and are unconditionally invalid for the same reason a disabled
        // opcode is: hiding one inside a never-taken branch must not make it
        // disappear.
        match op.opcode {
            OP_IF | OP_NOTIF => {
                let taken = if self.executing() {
                    // MINIMALIF is consensus-mandatory only for tapscript
                    // (BIP342); segwit v0's MINIMALIF is policy-only, and
                    // legacy scripts may push any truthy value.
                    let value = if matches!(self.context.mode, ExecutionMode::Tapscript { .. }) {
                        self.stack.peek_minimal_bool()?
                    } else {
                        self.stack.peek_bool()?
                    };
                    self.stack.drop()?;
                    if op.opcode == OP_NOTIF {
                        !value
                    } else {
                        value
                    }
                } else {
                    false
                };
                self.conditional.push(taken);
                return Ok(());
            }
            OP_VERIF | OP_VERNOTIF => return Err(ScriptError::OpFailed("VERIF")),
            OP_ELSE => {
                let top = self
                    .conditional
                    .last_mut()
                    .ok_or(ScriptError::InvalidStackScope)?;
                *top = !*top;
                return Ok(());
            }
            OP_ENDIF => {
                self.conditional.pop().ok_or(ScriptError::InvalidStackScope)?;
                return Ok(());
            }
            _ => {}
        }

        if !self.executing() {
            return Ok(());
        }

        match op.opcode {
            OP_0 => self.stack.push(Vec::new())?,
            OP_1NEGATE => self.stack.push_int(-1)?,
            OP_1..=OP_16 => self.stack.push_int((op.opcode - OP_1 + 1) as i64)?,
            OP_RESERVED | OP_RESERVED1 | OP_RESERVED2 | OP_VER => {
                return Err(ScriptError::OpFailed("RESERVED"))
            }
            OP_NOP => {}
            OP_VERIFY => {
                if !self.stack.peek_bool()? {
                    return Err(ScriptError::StackFalse);
                }
                self.stack.drop()?;
            }
            OP_RETURN => return Err(ScriptError::OpFailed("RETURN")),

            OP_TOALTSTACK => self.stack.to_alt()?,
            OP_FROMALTSTACK => self.stack.from_alt()?,
            OP_2DROP => {
                self.stack.drop()?;
                self.stack.drop()?;
            }
            OP_2DUP => self.dup_n(2)?,
            OP_3DUP => self.dup_n(3)?,
            OP_2OVER => self.over_n(2)?,
            OP_2ROT => self.rot_n(2)?,
            OP_2SWAP => self.swap_n(2)?,
            OP_IFDUP => {
                if self.stack.peek_bool()? {
                    let top = self.stack.peek_chunk()?.to_vec();
                    self.stack.push(top)?;
                }
            }
            OP_DEPTH => self.stack.push_int(self.stack.len() as i64)?,
            OP_DROP => self.stack.drop()?,
            OP_DUP => {
                let top = self.stack.peek_chunk()?.to_vec();
                self.stack.push(top)?;
            }
            OP_NIP => {
                let top = self.stack.pop()?;
                self.stack.drop()?;
                self.stack.push(top)?;
            }
            OP_OVER => self.over_n(1)?,
            OP_PICK | OP_ROLL => self.pick_or_roll(op.opcode == OP_ROLL)?,
            OP_ROT => self.rot_n(1)?,
            OP_SWAP => self.swap_n(1)?,
            OP_TUCK => {
                let top = self.stack.pop()?;
                let under = self.stack.pop()?;
                self.stack.push(top.clone())?;
                self.stack.push(under)?;
                self.stack.push(top)?;
            }

            OP_SIZE => {
                let len = self.stack.peek_chunk()?.len() as i64;
                self.stack.push_int(len)?;
            }
            OP_EQUAL | OP_EQUALVERIFY => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push_bool(a == b)?;
                if op.opcode == OP_EQUALVERIFY {
                    if !self.stack.peek_bool()? {
                        return Err(ScriptError::StackFalse);
                    }
                    self.stack.drop()?;
                }
            }
            OP_1ADD => self.unary_arith(|v| Some(v + 1))?,
            OP_1SUB => self.unary_arith(|v| Some(v - 1))?,
            OP_NEGATE => self.unary_arith(|v| Some(-v))?,
            OP_ABS => self.unary_arith(|v| Some(v.abs()))?,
            OP_NOT => self.unary_arith(|v| Some((v == 0) as i64))?,
            OP_0NOTEQUAL => self.unary_arith(|v| Some((v != 0) as i64))?,
            OP_ADD => self.binary_arith(|a, b| Some(a + b))?,
            OP_SUB => self.binary_arith(|a, b| Some(a - b))?,
            OP_BOOLAND => self.binary_arith(|a, b| Some(((a != 0) && (b != 0)) as i64))?,
            OP_BOOLOR => self.binary_arith(|a, b| Some(((a != 0) || (b != 0)) as i64))?,
            OP_NUMEQUAL => self.binary_arith(|a, b| Some((a == b) as i64))?,
            OP_NUMEQUALVERIFY => {
                self.binary_arith(|a, b| Some((a == b) as i64))?;
                if !self.stack.peek_bool()? {
                    return Err(ScriptError::StackFalse);
                }
                self.stack.drop()?;
            }
            OP_NUMNOTEQUAL => self.binary_arith(|a, b| Some((a != b) as i64))?,
            OP_LESSTHAN => self.binary_arith(|a, b| Some((a < b) as i64))?,
            OP_GREATERTHAN => self.binary_arith(|a, b| Some((a > b) as i64))?,
            OP_LESSTHANOREQUAL => self.binary_arith(|a, b| Some((a <= b) as i64))?,
            OP_GREATERTHANOREQUAL => self.binary_arith(|a, b| Some((a >= b) as i64))?,
            OP_MIN => self.binary_arith(|a, b| Some(a.min(b)))?,
            OP_MAX => self.binary_arith(|a, b| Some(a.max(b)))?,
            OP_WITHIN => {
                let max = self.pop_num()?;
                let min = self.pop_num()?;
                let value = self.pop_num()?;
                self.stack.push_bool(value >= min && value < max)?;
            }

            OP_RIPEMD160 => self.hash_top(|b| ripemd160(b).to_vec())?,
            OP_SHA1 => self.hash_top(|b| sha1(b).to_vec())?,
            OP_SHA256 => self.hash_top(|b| sha256(b).to_vec())?,
            OP_HASH160 => self.hash_top(|b| hash160(b).0.to_vec())?,
            OP_HASH256 => self.hash_top(|b| hash256(b).0.to_vec())?,
            OP_CODESEPARATOR => {
                self.code_separator_offset = self.pos;
                self.last_code_separator_pos = op_start as u32;
            }
            OP_CHECKSIG | OP_CHECKSIGVERIFY => self.checksig(op.opcode == OP_CHECKSIGVERIFY)?,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                self.checkmultisig(op.opcode == OP_CHECKMULTISIGVERIFY)?
            }
            OP_CHECKSIGADD => self.checksigadd()?,

            OP_CHECKLOCKTIMEVERIFY => self.checklocktimeverify()?,
            OP_CHECKSEQUENCEVERIFY => self.checksequenceverify()?,
            OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {}

            _ => return Err(ScriptError::OpFailed("UNKNOWN_OPCODE")),
        }
        Ok(())
    }

    fn dup_n(&mut self, n: usize) -> Result<(), ScriptError> {
        let items: Vec<Vec<u8>> = (0..n)
            .rev()
            .map(|i| self.stack.peek_at(i).map(<[u8]>::to_vec))
            .collect::<Result<_, _>>()?;
        for item in items {
            self.stack.push(item)?;
        }
        Ok(())
    }

    fn over_n(&mut self, n: usize) -> Result<(), ScriptError> {
        let items: Vec<Vec<u8>> = (0..n)
            .rev()
            .map(|i| self.stack.peek_at(n + i).map(<[u8]>::to_vec))
            .collect::<Result<_, _>>()?;
        for item in items {
            self.stack.push(item)?;
        }
        Ok(())
    }

    fn swap_n(&mut self, n: usize) -> Result<(), ScriptError> {
        let mut upper = Vec::with_capacity(n);
        for _ in 0..n {
            upper.push(self.stack.pop()?);
        }
        upper.reverse();
        let mut lower = Vec::with_capacity(n);
        for _ in 0..n {
            lower.push(self.stack.pop()?);
        }
        lower.reverse();
        for item in upper {
            self.stack.push(item)?;
        }
        for item in lower {
            self.stack.push(item)?;
        }
        Ok(())
    }

    fn rot_n(&mut self, n: usize) -> Result<(), ScriptError> {
        let mut c = Vec::with_capacity(n);
        for _ in 0..n {
            c.push(self.stack.pop()?);
        }
        c.reverse();
        let mut b = Vec::with_capacity(n);
        for _ in 0..n {
            b.push(self.stack.pop()?);
        }
        b.reverse();
        let mut a = Vec::with_capacity(n);
        for _ in 0..n {
            a.push(self.stack.pop()?);
        }
        a.reverse();
        for item in b {
            self.stack.push(item)?;
        }
        for item in c {
            self.stack.push(item)?;
        }
        for item in a {
            self.stack.push(item)?;
        }
        Ok(())
    }

    fn pick_or_roll(&mut self, roll: bool) -> Result<(), ScriptError> {
        let n = self.pop_num()?;
        if n < 0 {
            return Err(ScriptError::OpFailed("PICK_NEGATIVE_DEPTH"));
        }
        let n = n as usize;
        let item = if roll {
            self.stack.remove_at(n)?
        } else {
            self.stack.peek_at(n)?.to_vec()
        };
        self.stack.push(item)
    }

    fn pop_num(&mut self) -> Result<i64, ScriptError> {
        let v = self.stack.peek_signed(4)?;
        self.stack.drop()?;
        Ok(v)
    }

    fn unary_arith(&mut self, f: impl Fn(i64) -> Option<i64>) -> Result<(), ScriptError> {
        let v = self.pop_num()?;
        let result = f(v).ok_or(ScriptError::OpFailed("ARITHMETIC"))?;
        self.stack.push_int(result)
    }

    fn binary_arith(&mut self, f: impl Fn(i64, i64) -> Option<i64>) -> Result<(), ScriptError> {
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        let result = f(a, b).ok_or(ScriptError::OpFailed("ARITHMETIC"))?;
        self.stack.push_int(result)
    }

    fn hash_top(&mut self, f: impl Fn(&[u8]) -> Vec<u8>) -> Result<(), ScriptError> {
        let value = self.stack.pop()?;
        self.stack.push(f(&value))
    }

    fn signature_hash_type(&self, sig: &[u8]) -> (Vec<u8>, u32) {
        match sig.split_last() {
            Some((&flag, rest)) => (rest.to_vec(), flag as u32),
            None => (Vec::new(), SIGHASH_ALL),
        }
    }

    fn verify_signature(&self, sig: &[u8], pubkey: &[u8]) -> Result<bool, ScriptError> {
        if sig.is_empty() {
            return Ok(false);
        }
        match &self.context.mode {
            ExecutionMode::Legacy => {
                let (der, hash_type) = self.signature_hash_type(sig);
                let digest = self.context.sighash_cache.legacy(
                    self.context.input_index,
                    &self.script_code(),
                    hash_type,
                );
                Ok(satoshi_ec::keys::verify_ecdsa_der(pubkey, &digest.0, &der))
            }
            ExecutionMode::SegwitV0 { value } => {
                let (der, hash_type) = self.signature_hash_type(sig);
                let digest = self.context.sighash_cache.segwit_v0(
                    self.context.input_index,
                    &self.script_code(),
                    *value,
                    hash_type,
                );
                if !satoshi_ec::keys::is_low_s(&der) {
                    return Err(ScriptError::InvalidSignatureEncoding);
                }
                Ok(satoshi_ec::keys::verify_ecdsa_der(pubkey, &digest.0, &der))
            }
            ExecutionMode::Tapscript { leaf_hash, annex } => {
                if pubkey.len() != 32 {
                    return Err(ScriptError::InvalidSignatureEncoding);
                }
                let (sig64, hash_type) = match sig.len() {
                    64 => (sig, SIGHASH_DEFAULT),
                    65 => (&sig[..64], sig[64]),
                    _ => return Err(ScriptError::InvalidSignatureEncoding),
                };
                let digest = self.context.sighash_cache.taproot(
                    self.context.input_index,
                    hash_type,
                    annex.as_deref(),
                    Some(TapscriptExtension {
                        tapleaf_hash: *leaf_hash,
                        key_version: 0,
                        codeseparator_position: self.last_code_separator_pos,
                    }),
                );
                let mut pk32 = [0u8; 32];
                pk32.copy_from_slice(pubkey);
                let mut sig_arr = [0u8; 64];
                sig_arr.copy_from_slice(sig64);
                Ok(satoshi_ec::keys::verify_schnorr(&pk32, &digest.0, &sig_arr))
            }
        }
    }

    fn enforces_nullfail(&self) -> bool {
        !matches!(self.context.mode, ExecutionMode::Legacy)
    }

    fn checksig(&mut self, verify: bool) -> Result<(), ScriptError> {
        let pubkey = self.stack.pop()?;
        let sig = self.stack.pop()?;
        let ok = self.verify_signature(&sig, &pubkey)?;
        if !ok && !sig.is_empty() && self.enforces_nullfail() {
            return Err(ScriptError::IncorrectSignature);
        }
        self.stack.push_bool(ok)?;
        if verify {
            if !self.stack.peek_bool()? {
                return Err(ScriptError::StackFalse);
            }
            self.stack.drop()?;
        }
        Ok(())
    }

    fn checksigadd(&mut self) -> Result<(), ScriptError> {
        let pubkey = self.stack.pop()?;
        let n = self.pop_num()?;
        let sig = self.stack.pop()?;
        let ok = self.verify_signature(&sig, &pubkey)?;
        if !ok && !sig.is_empty() {
            return Err(ScriptError::IncorrectSignature);
        }
        self.stack.push_int(n + ok as i64)
    }

    fn checkmultisig(&mut self, verify: bool) -> Result<(), ScriptError> {
        let pubkey_count = self.pop_num()?;
        if !(0..=20).contains(&pubkey_count) {
            return Err(ScriptError::OpFailed("CHECKMULTISIG_PUBKEY_COUNT"));
        }
        let mut pubkeys = Vec::with_capacity(pubkey_count as usize);
        for _ in 0..pubkey_count {
            pubkeys.push(self.stack.pop()?);
        }
        let sig_count = self.pop_num()?;
        if !(0..=pubkey_count).contains(&sig_count) {
            return Err(ScriptError::OpFailed("CHECKMULTISIG_SIG_COUNT"));
        }
        let mut sigs = Vec::with_capacity(sig_count as usize);
        for _ in 0..sig_count {
            sigs.push(self.stack.pop()?);
        }
        // The historical off-by-one: one extra stack item is consumed and
        // discarded, unconditionally.
        let dummy = self.stack.pop()?;
        if self.enforces_nullfail() && !dummy.is_empty() {
            return Err(ScriptError::OpFailed("NULLDUMMY"));
        }

        let mut sig_idx = 0usize;
        let mut key_idx = 0usize;
        let mut all_ok = true;
        while sig_idx < sigs.len() {
            if key_idx >= pubkeys.len() {
                all_ok = false;
                break;
            }
            // Signatures and keys were pushed low-to-high; popped them
            // high-to-low, so index from the end to preserve order.
            let sig = &sigs[sigs.len() - 1 - sig_idx];
            let pubkey = &pubkeys[pubkeys.len() - 1 - key_idx];
            if self.verify_signature(sig, pubkey)? {
                sig_idx += 1;
            } else if !sig.is_empty() && self.enforces_nullfail() {
                return Err(ScriptError::IncorrectSignature);
            }
            key_idx += 1;
        }
        if sig_idx < sigs.len() {
            all_ok = false;
        }

        self.stack.push_bool(all_ok)?;
        if verify {
            if !self.stack.peek_bool()? {
                return Err(ScriptError::StackFalse);
            }
            self.stack.drop()?;
        }
        Ok(())
    }

    fn checklocktimeverify(&mut self) -> Result<(), ScriptError> {
        if self.context.input_sequence == 0xffff_ffff {
            return Err(ScriptError::OpFailed("CLTV_FINAL_SEQUENCE"));
        }
        let top = self.stack.peek_chunk()?;
        let threshold = decode_script_number(top, 5)?;
        if threshold < 0 {
            return Err(ScriptError::OpFailed("CLTV_NEGATIVE"));
        }
        const LOCKTIME_THRESHOLD: i64 = 500_000_000;
        let locktime = self.context.tx_locktime as i64;
        if (threshold < LOCKTIME_THRESHOLD) != (locktime < LOCKTIME_THRESHOLD) {
            return Err(ScriptError::OpFailed("CLTV_DOMAIN_MISMATCH"));
        }
        if locktime < threshold {
            return Err(ScriptError::OpFailed("CLTV_UNSATISFIED"));
        }
        Ok(())
    }

    fn checksequenceverify(&mut self) -> Result<(), ScriptError> {
        if self.context.tx_version < 2 {
            return Err(ScriptError::OpFailed("CSV_TX_VERSION"));
        }
        let top = self.stack.peek_chunk()?;
        let sequence = decode_script_number(top, 5)?;
        if sequence < 0 {
            return Err(ScriptError::OpFailed("CSV_NEGATIVE"));
        }
        const DISABLE_FLAG: i64 = 1 << 31;
        if sequence & DISABLE_FLAG != 0 {
            return Ok(());
        }
        let input_sequence = self.context.input_sequence as i64;
        if input_sequence & DISABLE_FLAG != 0 {
            return Err(ScriptError::OpFailed("CSV_INPUT_DISABLED"));
        }
        const TYPE_FLAG: i64 = 1 << 22;
        const MASK: i64 = 0x0000_ffff;
        if (sequence & TYPE_FLAG) != (input_sequence & TYPE_FLAG) {
            return Err(ScriptError::OpFailed("CSV_TYPE_MISMATCH"));
        }
        if (input_sequence & MASK) < (sequence & MASK) {
            return Err(ScriptError::OpFailed("CSV_UNSATISFIED"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sighash::SighashCache;
    use satoshi_chain::{Input, Point, Transaction};

    fn dummy_context<'a>(cache: &'a SighashCache<'a>, prevouts: &'a [Output]) -> VerifyContext<'a> {
        VerifyContext {
            sighash_cache: cache,
            prevouts,
            input_index: 0,
            tx_version: 2,
            tx_locktime: 0,
            input_sequence: 0xffff_ffff,
            mode: ExecutionMode::Legacy,
        }
    }

    fn sample_tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![Input::new(Point::new(Hash32::zero(), 0), Script::empty(), 0xffff_ffff)],
            outputs: vec![],
            locktime: 0,
        }
    }

    #[test]
    fn simple_add_equal_script_succeeds() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let ctx = dummy_context(&cache, &[]);
        // OP_2 OP_3 OP_ADD OP_5 OP_EQUAL
        let script = Script::new(vec![OP_1 + 1, OP_1 + 2, OP_ADD, OP_1 + 4, OP_EQUAL]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        program.run().unwrap();
        assert!(program.succeeded());
    }

    #[test]
    fn unbalanced_if_is_rejected() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let ctx = dummy_context(&cache, &[]);
        let script = Script::new(vec![OP_1, OP_IF, OP_1]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        assert_eq!(program.run(), Err(ScriptError::InvalidStackScope));
    }

    #[test]
    fn else_branch_taken_when_condition_false() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let ctx = dummy_context(&cache, &[]);
        let script = Script::new(vec![OP_0, OP_IF, OP_0, OP_ELSE, OP_1, OP_ENDIF]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        program.run().unwrap();
        assert!(program.succeeded());
    }

    #[test]
    fn disabled_opcode_fails() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let ctx = dummy_context(&cache, &[]);
        let script = Script::new(vec![OP_1, OP_1, OP_CAT]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        assert!(program.run().is_err());
    }

    #[test]
    fn disabled_opcode_fails_even_inside_an_untaken_branch() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let ctx = dummy_context(&cache, &[]);
        // OP_0 OP_IF OP_1 OP_1 OP_CAT OP_ENDIF
        let script = Script::new(vec![OP_0, OP_IF, OP_1, OP_1, OP_CAT, OP_ENDIF]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        assert!(program.run().is_err());
    }

    #[test]
    fn verif_fails_even_inside_an_untaken_branch() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let ctx = dummy_context(&cache, &[]);
        // OP_0 OP_IF OP_VERIF OP_ENDIF
        let script = Script::new(vec![OP_0, OP_IF, OP_VERIF, OP_ENDIF]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        assert!(program.run().is_err());
    }

    #[test]
    fn minimalif_is_not_enforced_for_segwit_v0() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let mut ctx = dummy_context(&cache, &[]);
        ctx.mode = ExecutionMode::SegwitV0 { value: 0 };
        // A non-minimal but truthy OP_IF argument: [0x01, 0x00].
        let script = Script::new(vec![0x02, 0x01, 0x00, OP_IF, OP_1, OP_ENDIF]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        program.run().unwrap();
        assert!(program.succeeded());
    }

    #[test]
    fn minimalif_is_enforced_for_tapscript() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let mut ctx = dummy_context(&cache, &[]);
        ctx.mode = ExecutionMode::Tapscript {
            leaf_hash: Hash32::zero(),
            annex: None,
        };
        let script = Script::new(vec![0x02, 0x01, 0x00, OP_IF, OP_1, OP_ENDIF]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        assert!(program.run().is_err());
    }

    #[test]
    fn op_success_unconditionally_succeeds_a_tapscript() {
        let tx = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let mut ctx = dummy_context(&cache, &[]);
        ctx.mode = ExecutionMode::Tapscript {
            leaf_hash: Hash32::zero(),
            annex: None,
        };
        // OP_RESERVED1 (0x89) is an OP_SUCCESSx hole; OP_RETURN right after
        // it would otherwise fail the script if it were actually reached.
        let script = Script::new(vec![0x89, OP_RETURN]);
        let mut program = Program::new(&script, Stack::new(Vec::new()), &ctx);
        program.run().unwrap();
        assert!(program.succeeded());
    }
}
