// Simulated single-network execution environment: token ledger, native balances,
// event logs and an all-or-nothing call boundary.

use crate::cross_chain::types::{RequestStatus, RouterEvent};
use crate::onchain::interface::BridgeMessage;
use ethers::types::{Address, H256, U256};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient balance of token {token:?} for {holder:?}: needed {needed}, available {available}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        needed: U256,
        available: U256,
    },
    #[error("insufficient native balance for {holder:?}: needed {needed}, available {available}")]
    InsufficientNative {
        holder: Address,
        needed: U256,
        available: U256,
    },
    #[error("balance overflow for {holder:?}")]
    Overflow { holder: Address },
}

// A block groups the events emitted since the previous block
#[derive(Clone, Debug)]
pub struct Block {
    pub block_number: u64,
    pub timestamp: u64,
    pub events: Vec<RouterEvent>,
}

/// Mutable state of one network. Every field takes part in rollback, so a
/// failed call leaves no trace of its transfers, events or outbound messages.
#[derive(Clone, Debug)]
pub struct ChainState {
    chain_id: u64,
    timestamp: u64,
    // token -> holder -> balance
    balances: HashMap<Address, HashMap<Address, U256>>,
    native_balances: HashMap<Address, U256>,
    logs: Vec<RouterEvent>,
    outbox: Vec<BridgeMessage>,
    request_status: HashMap<H256, RequestStatus>,
    sequence: u64,
}

impl ChainState {
    pub fn new(chain_id: u64, timestamp: u64) -> Self {
        ChainState {
            chain_id,
            timestamp,
            balances: HashMap::new(),
            native_balances: HashMap::new(),
            logs: Vec::new(),
            outbox: Vec::new(),
            request_status: HashMap::new(),
            sequence: 0,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Runs `f` against a copy of the state and keeps the copy only if `f` succeeds.
    pub fn transact<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut ChainState) -> Result<T, E>,
    {
        let mut scratch = self.clone();
        let result = f(&mut scratch)?;
        *self = scratch;
        Ok(result)
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&token)
            .and_then(|holders| holders.get(&holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        let balance = self.balances.entry(token).or_default().entry(to).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { holder: to })?;
        Ok(())
    }

    pub fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.balance_of(token, from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                token,
                holder: from,
                needed: amount,
                available,
            })?;
        self.balances.entry(token).or_default().insert(from, remaining);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        self.burn(token, from, amount)?;
        self.mint(token, to, amount)
    }

    pub fn native_balance(&self, holder: Address) -> U256 {
        self.native_balances.get(&holder).copied().unwrap_or_default()
    }

    pub fn fund_native(&mut self, holder: Address, amount: U256) -> Result<(), LedgerError> {
        let balance = self.native_balances.entry(holder).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { holder })?;
        Ok(())
    }

    pub fn transfer_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        let available = self.native_balance(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientNative {
                holder: from,
                needed: amount,
                available,
            })?;
        self.native_balances.insert(from, remaining);
        self.fund_native(to, amount)
    }

    /// Wrapped-native deposit: native value moves into the wrapper contract and
    /// the holder is credited the same amount of the wrapper token.
    pub fn wrap_native(&mut self, wrapped: Address, holder: Address, amount: U256) -> Result<(), LedgerError> {
        self.transfer_native(holder, wrapped, amount)?;
        self.mint(wrapped, holder, amount)
    }

    pub fn unwrap_native(&mut self, wrapped: Address, holder: Address, amount: U256) -> Result<(), LedgerError> {
        self.burn(wrapped, holder, amount)?;
        self.transfer_native(wrapped, holder, amount)
    }

    pub fn emit(&mut self, event: RouterEvent) {
        self.logs.push(event);
    }

    pub fn logs(&self) -> &[RouterEvent] {
        &self.logs
    }

    pub fn push_outbox(&mut self, message: BridgeMessage) {
        self.outbox.push(message);
    }

    pub fn outbox(&self) -> &[BridgeMessage] {
        &self.outbox
    }

    pub fn request_status(&self, id: &H256) -> RequestStatus {
        self.request_status.get(id).copied().unwrap_or(RequestStatus::Null)
    }

    pub fn set_request_status(&mut self, id: H256, status: RequestStatus) {
        self.request_status.insert(id, status);
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

// Simulate a single blockchain environment
#[derive(Debug)]
pub struct ChainSimulator {
    pub current_block_number: u64,
    pub blocks: Vec<Block>,
    pub block_time_secs: u64,
    state: ChainState,
    // Index into state logs of the first event not yet sealed into a block
    unsealed_from: usize,
}

impl ChainSimulator {
    pub fn new(chain_id: u64, genesis_timestamp: u64) -> Self {
        ChainSimulator {
            current_block_number: 0,
            blocks: Vec::new(),
            block_time_secs: 12,
            state: ChainState::new(chain_id, genesis_timestamp),
            unsealed_from: 0,
        }
    }

    /// Starts the simulated clock at wall-clock time.
    pub fn starting_now(chain_id: u64) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Self::new(chain_id, now)
    }

    pub fn chain_id(&self) -> u64 {
        self.state.chain_id()
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    // Direct access for genesis setup (minting liquidity, funding accounts)
    pub fn state_mut(&mut self) -> &mut ChainState {
        &mut self.state
    }

    /// Executes one external call with all-or-nothing semantics.
    pub fn transact<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut ChainState) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let chain_id = self.chain_id();
        self.state.transact(f).map_err(|e| {
            log::debug!("[ChainSim {}] Call reverted: {}", chain_id, e);
            e
        })
    }

    /// Mines a block: advances the clock and seals events emitted since the last block.
    pub fn finalize_next_block(&mut self) -> &Block {
        self.current_block_number += 1;
        self.state.timestamp += self.block_time_secs;
        let events = self.state.logs[self.unsealed_from..].to_vec();
        self.unsealed_from = self.state.logs.len();
        log::debug!(
            "[ChainSim {}] Finalized block {} with {} events",
            self.chain_id(),
            self.current_block_number,
            events.len()
        );
        self.blocks.push(Block {
            block_number: self.current_block_number,
            timestamp: self.state.timestamp,
            events,
        });
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.state.timestamp += secs;
    }

    pub fn events(&self) -> &[RouterEvent] {
        self.state.logs()
    }

    /// Hands queued outbound bridge messages to the transport.
    pub fn drain_outbox(&mut self) -> Vec<BridgeMessage> {
        std::mem::take(&mut self.state.outbox)
    }
}
