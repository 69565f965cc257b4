//! Typed operation façade over a [`ConfidentialCompute`] provider.
//!
//! Every method is total over values. The saturating arithmetic helpers are
//! composed from wrapping arithmetic, comparison, and select so that the same
//! provider calls are issued whether or not the operation saturates.

use aether_types::{Address, AssetId};

use crate::handle::{Handle, Plaintext};
use crate::provider::{BinaryOp, ConfidentialCompute};
use crate::values::{Eaddress, Ebool, Encrypted, EncryptedUint, Euint256, Euint64, Euint8};
use crate::{FheError, Result};

/// Typed access to a confidential-compute provider.
pub struct Fhe<'p> {
    provider: &'p mut dyn ConfidentialCompute,
}

impl<'p> Fhe<'p> {
    pub fn new(provider: &'p mut dyn ConfidentialCompute) -> Self {
        Self { provider }
    }

    // ---- encryption of caller-supplied plaintexts ----

    pub fn encrypt_bool(&mut self, value: bool) -> Result<Ebool> {
        self.encrypt(Plaintext::Bool(value))
    }

    pub fn encrypt_u8(&mut self, value: u8) -> Result<Euint8> {
        self.encrypt(Plaintext::Uint8(value))
    }

    pub fn encrypt_u64(&mut self, value: u64) -> Result<Euint64> {
        self.encrypt(Plaintext::Uint64(value))
    }

    pub fn encrypt_address(&mut self, value: Address) -> Result<Eaddress> {
        self.encrypt(Plaintext::Address(value))
    }

    pub fn encrypt_u256(&mut self, value: AssetId) -> Result<Euint256> {
        self.encrypt(Plaintext::Uint256(value))
    }

    /// Encrypt `value` as `T`. Fails if the plaintext type differs.
    pub fn encrypt<T: Encrypted>(&mut self, value: Plaintext) -> Result<T> {
        if value.fhe_type() != T::TYPE {
            return Err(FheError::TypeMismatch {
                expected: T::TYPE,
                actual: value.fhe_type(),
            });
        }
        let handle = self.provider.trivial_encrypt(value)?;
        Ok(T::from_handle_unchecked(handle))
    }

    // ---- comparisons ----

    pub fn eq<T: Encrypted>(&mut self, lhs: T, rhs: T) -> Result<Ebool> {
        self.compare(BinaryOp::Eq, lhs, rhs)
    }

    pub fn ne<T: Encrypted>(&mut self, lhs: T, rhs: T) -> Result<Ebool> {
        self.compare(BinaryOp::Ne, lhs, rhs)
    }

    pub fn lt<T: EncryptedUint>(&mut self, lhs: T, rhs: T) -> Result<Ebool> {
        self.compare(BinaryOp::Lt, lhs, rhs)
    }

    pub fn le<T: EncryptedUint>(&mut self, lhs: T, rhs: T) -> Result<Ebool> {
        self.compare(BinaryOp::Le, lhs, rhs)
    }

    fn compare<T: Encrypted>(&mut self, op: BinaryOp, lhs: T, rhs: T) -> Result<Ebool> {
        let handle = self.provider.binary(op, lhs.handle(), rhs.handle())?;
        Ok(Ebool::from_handle_unchecked(handle))
    }

    // ---- logic ----

    /// Logical AND for booleans, bitwise AND for integers.
    pub fn and<T: Encrypted>(&mut self, lhs: T, rhs: T) -> Result<T> {
        self.same_type(BinaryOp::And, lhs, rhs)
    }

    /// Logical OR for booleans, bitwise OR for integers.
    pub fn or<T: Encrypted>(&mut self, lhs: T, rhs: T) -> Result<T> {
        self.same_type(BinaryOp::Or, lhs, rhs)
    }

    pub fn xor<T: Encrypted>(&mut self, lhs: T, rhs: T) -> Result<T> {
        self.same_type(BinaryOp::Xor, lhs, rhs)
    }

    pub fn not<T: Encrypted>(&mut self, value: T) -> Result<T> {
        let handle = self.provider.not(value.handle())?;
        Ok(T::from_handle_unchecked(handle))
    }

    /// `cond ? if_true : if_false`.
    pub fn select<T: Encrypted>(&mut self, cond: Ebool, if_true: T, if_false: T) -> Result<T> {
        let handle = self
            .provider
            .select(cond.handle(), if_true.handle(), if_false.handle())?;
        Ok(T::from_handle_unchecked(handle))
    }

    // ---- arithmetic ----

    /// Wrapping addition.
    pub fn add<T: EncryptedUint>(&mut self, lhs: T, rhs: T) -> Result<T> {
        self.same_type(BinaryOp::Add, lhs, rhs)
    }

    /// Wrapping subtraction.
    pub fn sub<T: EncryptedUint>(&mut self, lhs: T, rhs: T) -> Result<T> {
        self.same_type(BinaryOp::Sub, lhs, rhs)
    }

    /// Addition clamped at the type's maximum.
    pub fn add_saturating<T: EncryptedUint>(&mut self, lhs: T, rhs: T) -> Result<T> {
        let sum = self.add(lhs, rhs)?;
        let overflowed = self.lt(sum, lhs)?;
        let max: T = self.encrypt(T::max())?;
        self.select(overflowed, max, sum)
    }

    /// Subtraction clamped at zero.
    pub fn sub_saturating<T: EncryptedUint>(&mut self, lhs: T, rhs: T) -> Result<T> {
        let underflows = self.lt(lhs, rhs)?;
        let diff = self.sub(lhs, rhs)?;
        let zero: T = self.encrypt(T::zero())?;
        self.select(underflows, zero, diff)
    }

    fn same_type<T: Encrypted>(&mut self, op: BinaryOp, lhs: T, rhs: T) -> Result<T> {
        let handle = self.provider.binary(op, lhs.handle(), rhs.handle())?;
        Ok(T::from_handle_unchecked(handle))
    }

    // ---- access control and views ----

    /// Allow `account` to decrypt `value`.
    pub fn allow<T: Encrypted>(&mut self, value: T, account: Address) -> Result<()> {
        self.provider.allow(value.handle(), account)
    }

    /// Wrap a raw handle as `T` after checking the provider's stored type.
    pub fn view<T: Encrypted>(&self, handle: Handle) -> Result<T> {
        let actual = self.provider.type_of(handle)?;
        if actual != T::TYPE {
            return Err(FheError::TypeMismatch {
                expected: T::TYPE,
                actual,
            });
        }
        Ok(T::from_handle_unchecked(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_process::{InProcessProvider, ProviderConfig};

    fn provider() -> InProcessProvider {
        InProcessProvider::new(ProviderConfig::default())
    }

    #[test]
    fn test_comparisons() {
        let mut p = provider();
        let (lt, le, eq, ne) = {
            let mut fhe = Fhe::new(&mut p);
            let a = fhe.encrypt_u64(3).expect("encrypt");
            let b = fhe.encrypt_u64(7).expect("encrypt");
            (
                fhe.lt(a, b).expect("lt"),
                fhe.le(b, a).expect("le"),
                fhe.eq(a, a).expect("eq"),
                fhe.ne(a, b).expect("ne"),
            )
        };
        assert_eq!(p.reveal(lt.handle()).expect("reveal"), Plaintext::Bool(true));
        assert_eq!(p.reveal(le.handle()).expect("reveal"), Plaintext::Bool(false));
        assert_eq!(p.reveal(eq.handle()).expect("reveal"), Plaintext::Bool(true));
        assert_eq!(p.reveal(ne.handle()).expect("reveal"), Plaintext::Bool(true));
    }

    #[test]
    fn test_select_picks_branch() {
        let mut p = provider();
        let (picked_true, picked_false) = {
            let mut fhe = Fhe::new(&mut p);
            let yes = fhe.encrypt_bool(true).expect("encrypt");
            let no = fhe.not(yes).expect("not");
            let alice = fhe.encrypt_address(Address([0xA1; 20])).expect("encrypt");
            let bob = fhe.encrypt_address(Address([0xB0; 20])).expect("encrypt");
            (
                fhe.select(yes, alice, bob).expect("select"),
                fhe.select(no, alice, bob).expect("select"),
            )
        };
        assert_eq!(
            p.reveal(picked_true.handle()).expect("reveal"),
            Plaintext::Address(Address([0xA1; 20]))
        );
        assert_eq!(
            p.reveal(picked_false.handle()).expect("reveal"),
            Plaintext::Address(Address([0xB0; 20]))
        );
    }

    #[test]
    fn test_saturating_arithmetic() {
        let mut p = provider();
        let (floor, ceiling, plain_sub, plain_add) = {
            let mut fhe = Fhe::new(&mut p);
            let zero = fhe.encrypt_u64(0).expect("encrypt");
            let one = fhe.encrypt_u64(1).expect("encrypt");
            let five = fhe.encrypt_u64(5).expect("encrypt");
            let max = fhe.encrypt_u64(u64::MAX).expect("encrypt");
            (
                fhe.sub_saturating(zero, one).expect("sub"),
                fhe.add_saturating(max, one).expect("add"),
                fhe.sub_saturating(five, one).expect("sub"),
                fhe.add_saturating(five, one).expect("add"),
            )
        };
        assert_eq!(p.reveal(floor.handle()).expect("reveal"), Plaintext::Uint64(0));
        assert_eq!(
            p.reveal(ceiling.handle()).expect("reveal"),
            Plaintext::Uint64(u64::MAX)
        );
        assert_eq!(p.reveal(plain_sub.handle()).expect("reveal"), Plaintext::Uint64(4));
        assert_eq!(p.reveal(plain_add.handle()).expect("reveal"), Plaintext::Uint64(6));
    }

    #[test]
    fn test_bitwise_or_on_masks() {
        let mut p = provider();
        let mask = {
            let mut fhe = Fhe::new(&mut p);
            let a = fhe.encrypt_u8(0b0001).expect("encrypt");
            let b = fhe.encrypt_u8(0b0100).expect("encrypt");
            fhe.or(a, b).expect("or")
        };
        assert_eq!(p.reveal(mask.handle()).expect("reveal"), Plaintext::Uint8(0b0101));
    }

    #[test]
    fn test_view_checks_type() {
        let mut p = provider();
        let mut fhe = Fhe::new(&mut p);
        let flag = fhe.encrypt_bool(true).expect("encrypt");
        assert!(fhe.view::<Ebool>(flag.handle()).is_ok());
        assert!(matches!(
            fhe.view::<Euint64>(flag.handle()),
            Err(FheError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_encrypt_rejects_wrong_plaintext_type() {
        let mut p = provider();
        let mut fhe = Fhe::new(&mut p);
        let result: Result<Euint8> = fhe.encrypt(Plaintext::Uint64(1));
        assert!(matches!(result, Err(FheError::TypeMismatch { .. })));
    }
}
