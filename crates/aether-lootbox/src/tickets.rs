//! Ticket purchase and per-buyer FIFO queues.
//!
//! Each ticket carries a secret 32-byte nonce drawn at purchase time and a
//! public commitment to it:
//!
//! ```text
//! seed_commitment = BLAKE3::derive_key("Aether v1 ticket-seed",
//!                       LE32-framed(label, buyer, LE64(sequence), nonce))
//! ```
//!
//! The nonce never leaves the ledger while the ticket is queued. Loot
//! resolution keys its rolls with it and reveals it afterwards, so an
//! outcome can be checked against the commitment published at purchase but
//! cannot be predicted before the ticket is spent.

use std::collections::{HashMap, VecDeque};

use aether_crypto::blake3;
use aether_types::Address;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use zeroize::Zeroizing;

use crate::{LootError, Result};

/// Length of a ticket nonce.
pub const NONCE_LEN: usize = 32;

/// A purchased right to one loot resolution.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub buyer: Address,
    pub sequence: u64,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub seed_commitment: [u8; 32],
    pub price_paid: u128,
}

/// Result of a successful purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub tickets: Vec<Ticket>,
    /// Overpayment returned to the buyer.
    pub refund: u128,
}

/// Derive the seed commitment of a ticket.
pub fn derive_seed_commitment(
    label: &[u8],
    buyer: &Address,
    sequence: u64,
    nonce: &[u8; NONCE_LEN],
) -> [u8; 32] {
    let input = blake3::encode_multi_field(&[
        label,
        buyer.as_bytes(),
        &sequence.to_le_bytes(),
        nonce,
    ]);
    blake3::derive_key(blake3::contexts::TICKET_SEED, &input)
}

/// A queued ticket and its undisclosed nonce.
struct Sealed {
    ticket: Ticket,
    nonce: Zeroizing<[u8; NONCE_LEN]>,
}

/// Per-buyer ticket queues.
pub struct TicketLedger {
    queues: HashMap<Address, VecDeque<Sealed>>,
    next_sequence: u64,
    entropy: Box<dyn RngCore + Send>,
}

impl std::fmt::Debug for TicketLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketLedger")
            .field("buyers", &self.queues.len())
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

impl Default for TicketLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketLedger {
    /// A ledger drawing nonces from the operating system.
    pub fn new() -> Self {
        Self::with_entropy(OsRng)
    }

    /// A ledger drawing nonces from `entropy`.
    pub fn with_entropy(entropy: impl RngCore + Send + 'static) -> Self {
        Self {
            queues: HashMap::new(),
            next_sequence: 0,
            entropy: Box::new(entropy),
        }
    }

    /// Buy `amount` tickets at `price` each.
    ///
    /// Validates everything and draws every nonce before touching any queue.
    pub fn buy(
        &mut self,
        price: u128,
        buyer: Address,
        label: &[u8],
        amount: u32,
        payment: u128,
    ) -> Result<Purchase> {
        if buyer.is_zero() {
            return Err(LootError::ZeroBuyer);
        }
        if amount == 0 {
            return Err(LootError::InvalidAmount);
        }
        let required = price
            .checked_mul(u128::from(amount))
            .ok_or(LootError::InvalidAmount)?;
        if payment < required {
            return Err(LootError::InsufficientPayment {
                required,
                offered: payment,
            });
        }
        let first = self.next_sequence;
        let next = first
            .checked_add(u64::from(amount))
            .ok_or(LootError::InvalidAmount)?;

        let mut sealed = Vec::new();
        for sequence in first..next {
            let mut nonce = Zeroizing::new([0u8; NONCE_LEN]);
            self.entropy
                .try_fill_bytes(&mut nonce[..])
                .map_err(|e| LootError::Entropy(e.to_string()))?;
            let ticket = Ticket {
                buyer,
                sequence,
                seed_commitment: derive_seed_commitment(label, &buyer, sequence, &nonce),
                price_paid: price,
            };
            sealed.push(Sealed { ticket, nonce });
        }

        let tickets = sealed.iter().map(|s| s.ticket.clone()).collect();
        self.next_sequence = next;
        self.queues.entry(buyer).or_default().extend(sealed);

        Ok(Purchase {
            tickets,
            refund: payment - required,
        })
    }

    /// The next ticket of `buyer` together with its nonce.
    pub(crate) fn head(&self, buyer: &Address) -> Option<(&Ticket, &[u8; NONCE_LEN])> {
        self.queues
            .get(buyer)
            .and_then(VecDeque::front)
            .map(|s| (&s.ticket, &*s.nonce))
    }

    /// Consume the oldest ticket of `buyer`.
    pub fn pop(&mut self, buyer: &Address) -> Result<Ticket> {
        self.queues
            .get_mut(buyer)
            .and_then(VecDeque::pop_front)
            .map(|s| s.ticket)
            .ok_or(LootError::NoTicket(*buyer))
    }

    /// Number of unconsumed tickets of `buyer`.
    pub fn pending(&self, buyer: &Address) -> usize {
        self.queues.get(buyer).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PRICE: u128 = 100;

    fn alice() -> Address {
        Address([0xA1; 20])
    }

    fn seeded(seed: u8) -> TicketLedger {
        TicketLedger::with_entropy(StdRng::from_seed([seed; 32]))
    }

    #[test]
    fn test_overpayment_refunded() {
        let mut ledger = TicketLedger::new();
        let purchase = ledger.buy(PRICE, alice(), b"box", 1, PRICE + 7).expect("buy");
        assert_eq!(purchase.refund, 7);
        assert_eq!(purchase.tickets.len(), 1);
        assert_eq!(ledger.pending(&alice()), 1);
    }

    #[test]
    fn test_underpayment_leaves_queue_untouched() {
        let mut ledger = TicketLedger::new();
        let err = ledger
            .buy(PRICE, alice(), b"box", 2, 2 * PRICE - 1)
            .expect_err("underpaid");
        assert!(matches!(
            err,
            LootError::InsufficientPayment {
                required: 200,
                offered: 199
            }
        ));
        assert_eq!(ledger.pending(&alice()), 0);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut ledger = TicketLedger::new();
        assert!(matches!(
            ledger.buy(PRICE, alice(), b"box", 0, PRICE),
            Err(LootError::InvalidAmount)
        ));
    }

    #[test]
    fn test_zero_buyer_rejected() {
        let mut ledger = TicketLedger::new();
        assert!(matches!(
            ledger.buy(PRICE, Address::ZERO, b"box", 1, PRICE),
            Err(LootError::ZeroBuyer)
        ));
        assert_eq!(ledger.pending(&Address::ZERO), 0);
        // The rejected call did not advance the sequence.
        let purchase = ledger.buy(PRICE, alice(), b"box", 1, PRICE).expect("buy");
        assert_eq!(purchase.tickets[0].sequence, 0);
    }

    #[test]
    fn test_fifo_and_consumed_once() {
        let mut ledger = TicketLedger::new();
        let purchase = ledger.buy(PRICE, alice(), b"box", 2, 2 * PRICE).expect("buy");
        let first = ledger.pop(&alice()).expect("first");
        let second = ledger.pop(&alice()).expect("second");
        assert_eq!(first, purchase.tickets[0]);
        assert_eq!(second, purchase.tickets[1]);
        assert!(matches!(ledger.pop(&alice()), Err(LootError::NoTicket(_))));
    }

    #[test]
    fn test_single_ticket_pops_once() {
        let mut ledger = TicketLedger::new();
        ledger.buy(PRICE, alice(), b"box", 1, PRICE).expect("buy");
        assert!(ledger.pop(&alice()).is_ok());
        assert!(ledger.pop(&alice()).is_err());
    }

    #[test]
    fn test_queues_are_per_buyer() {
        let mut ledger = TicketLedger::new();
        let bob = Address([0xB0; 20]);
        ledger.buy(PRICE, alice(), b"box", 1, PRICE).expect("buy");
        assert!(matches!(ledger.pop(&bob), Err(LootError::NoTicket(addr)) if addr == bob));
        assert_eq!(ledger.pending(&alice()), 1);
    }

    #[test]
    fn test_commitment_binds_hidden_nonce() {
        let mut ledger = seeded(1);
        let purchase = ledger.buy(PRICE, alice(), b"same", 1, PRICE).expect("buy");
        let ticket = &purchase.tickets[0];
        let (head, nonce) = ledger.head(&alice()).expect("queued");
        assert_eq!(head, ticket);
        assert_eq!(
            ticket.seed_commitment,
            derive_seed_commitment(b"same", &alice(), ticket.sequence, nonce)
        );
        // Public inputs alone do not reproduce the commitment.
        assert_ne!(
            ticket.seed_commitment,
            derive_seed_commitment(b"same", &alice(), ticket.sequence, &[0u8; NONCE_LEN])
        );
    }

    #[test]
    fn test_same_public_inputs_differ_across_ledgers() {
        let mut a = seeded(1);
        let mut b = seeded(2);
        let ta = a.buy(PRICE, alice(), b"box", 1, PRICE).expect("buy");
        let tb = b.buy(PRICE, alice(), b"box", 1, PRICE).expect("buy");
        assert_eq!(ta.tickets[0].sequence, tb.tickets[0].sequence);
        assert_ne!(ta.tickets[0].seed_commitment, tb.tickets[0].seed_commitment);
    }

    #[test]
    fn test_seeded_entropy_is_reproducible() {
        let mut a = seeded(9);
        let mut b = seeded(9);
        let ta = a.buy(PRICE, alice(), b"box", 2, 2 * PRICE).expect("buy");
        let tb = b.buy(PRICE, alice(), b"box", 2, 2 * PRICE).expect("buy");
        assert_eq!(ta, tb);
        assert_ne!(ta.tickets[0].seed_commitment, ta.tickets[1].seed_commitment);
    }

    #[test]
    fn test_nonce_absent_from_serialized_ticket() {
        let mut ledger = seeded(3);
        ledger.buy(PRICE, alice(), b"box", 1, PRICE).expect("buy");
        let (ticket, nonce) = ledger.head(&alice()).expect("queued");
        let json = serde_json::to_string(ticket).expect("json");
        assert!(!json.contains(&hex::encode(nonce)));
    }
}
