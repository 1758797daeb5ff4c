// Transaction, block and chain validation
//
// Every check here is total: a bad input yields `false` and a debug log,
// never a panic or an error type. Validation runs strictly before any
// mutation, so the mutating side never needs to roll back.

use crate::consensus::pow::{DIFFICULTY, verify_proof};
use crate::core::{Block, Transaction, TransactionInput, TransactionOutput};
use crate::ledger::BlockChain;

/// Follow an input's indices into the chain, if they point anywhere
fn resolve_input<'a>(
    chain: &'a BlockChain,
    input: &TransactionInput,
) -> Option<&'a TransactionOutput> {
    chain
        .blocks
        .get(input.block_index)?
        .transactions
        .get(input.transaction_index)?
        .outputs
        .get(input.output_index)
}

/// Validate a transaction against the current chain.
///
/// With `require_utxo` set, each input must additionally still be present
/// in the UTXO set - the double-spend guard. Block replay contexts pass
/// `false`, since historical inputs have left the live set by definition.
///
/// Side effect: resolved input balances and the fee are cached on the
/// transaction, so the miner does not recompute them at sealing time.
pub fn check_transaction(tx: &mut Transaction, chain: &BlockChain, require_utxo: bool) -> bool {
    let signature = tx.verify_signature();
    if !signature.is_valid() {
        log::debug!("transaction {}: rejected ({:?})", tx.hash(), signature);
        return false;
    }

    let mut input_total: u64 = 0;
    for i in 0..tx.inputs.len() {
        let (value, recipient_matches) = match resolve_input(chain, &tx.inputs[i]) {
            Some(output) => (output.value, output.recipient_address == tx.sender),
            None => {
                log::debug!("transaction {}: input resolves to nothing", tx.hash());
                return false;
            }
        };
        if value == 0 {
            log::debug!("transaction {}: input resolves to a zero-value output", tx.hash());
            return false;
        }
        if !recipient_matches {
            log::debug!("transaction {}: input belongs to someone else", tx.hash());
            return false;
        }
        if require_utxo && !chain.utxo_set.contains(&tx.inputs[i].outpoint()) {
            log::debug!("transaction {}: input already spent", tx.hash());
            return false;
        }
        tx.inputs[i].balance = Some(value);
        input_total += value;
    }

    for output in &tx.outputs {
        if !output.check_validity() {
            log::debug!("transaction {}: output without positive value", tx.hash());
            return false;
        }
    }

    // Coinbase transactions mint value; their fee is zero by definition
    let fee = if tx.is_coinbase() {
        0
    } else {
        match input_total.checked_sub(tx.total_output()) {
            Some(fee) => fee,
            None => {
                log::debug!("transaction {}: outputs exceed inputs", tx.hash());
                return false;
            }
        }
    };
    tx.fee = Some(fee);

    true
}

/// Validate a block against its predecessor. All conditions are ANDed;
/// the first failing one short-circuits.
pub fn check_block(block: &Block, prev: &Block) -> bool {
    if prev.index + 1 != block.index {
        log::debug!("block {}: does not follow index {}", block.index, prev.index);
        return false;
    }
    if prev.calculate_hash() != block.previous_block_hash {
        log::debug!("block {}: broken hash link", block.index);
        return false;
    }
    // Only genesis may be empty
    if block.transactions.is_empty() && block.index != 0 {
        log::debug!("block {}: no transactions", block.index);
        return false;
    }
    if block.timestamp <= prev.timestamp {
        log::debug!(
            "block {}: timestamp {} not after {}",
            block.index,
            block.timestamp,
            prev.timestamp
        );
        return false;
    }
    if !verify_proof(prev.proof, block.proof, DIFFICULTY) {
        log::debug!("block {}: invalid proof of work", block.index);
        return false;
    }
    true
}

/// Validate a whole chain by walking backward from the tip. A chain with
/// any invalid link is wholly rejected; there is no partial recovery.
pub fn check_chain(chain: &BlockChain) -> bool {
    for pair in chain.blocks.windows(2).rev() {
        if !check_block(&pair[1], &pair[0]) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::pow::find_proof;
    use crate::core::{Address, OutPoint};
    use crate::wallet::keys::Keypair;

    /// Chain whose genesis holds a 50-coin coinbase for `keys`
    fn funded_chain(keys: &Keypair) -> BlockChain {
        let mut genesis = Block::genesis();
        let mut coinbase = Transaction::coinbase(keys.address(), 50);
        keys.sign_transaction(&mut coinbase);
        genesis.transactions.push(coinbase);
        BlockChain::seeded(genesis)
    }

    fn signed_spend(keys: &Keypair, recipient: Address, value: u64) -> Transaction {
        let mut tx = Transaction::new(
            keys.address(),
            vec![TransactionInput::new(0, 0, 0)],
            vec![TransactionOutput::new(recipient, value)],
        );
        keys.sign_transaction(&mut tx);
        tx
    }

    /// A correctly mined successor carrying `transactions`
    fn next_block(chain: &BlockChain, transactions: Vec<Transaction>) -> Block {
        let last = chain.last_block();
        let mut block = Block::new(
            last.index + 1,
            find_proof(last.proof, DIFFICULTY),
            transactions,
            last.calculate_hash(),
        );
        if block.timestamp <= last.timestamp {
            block.timestamp = last.timestamp + 1e-6;
        }
        block
    }

    #[test]
    fn test_valid_transaction_passes_and_caches() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);
        let mut tx = signed_spend(&keys, Address("02bb".to_string()), 30);

        assert!(check_transaction(&mut tx, &chain, true));
        assert_eq!(tx.inputs[0].balance, Some(50));
        assert_eq!(tx.fee, Some(20));
    }

    #[test]
    fn test_unresolvable_input_fails() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);

        let mut tx = Transaction::new(
            keys.address(),
            vec![TransactionInput::new(9, 9, 9)],
            vec![TransactionOutput::new(Address("02bb".to_string()), 1)],
        );
        keys.sign_transaction(&mut tx);

        assert!(!check_transaction(&mut tx, &chain, false));
    }

    #[test]
    fn test_spending_someone_elses_output_fails() {
        let owner = Keypair::generate();
        let thief = Keypair::generate();
        let chain = funded_chain(&owner);

        let mut tx = signed_spend(&thief, Address("02bb".to_string()), 10);
        assert!(!check_transaction(&mut tx, &chain, false));
    }

    #[test]
    fn test_double_spend_rejected_when_utxo_check_required() {
        let keys = Keypair::generate();
        let mut chain = funded_chain(&keys);

        // First spend consumes the genesis coinbase
        let mut first = signed_spend(&keys, Address("02bb".to_string()), 50);
        assert!(check_transaction(&mut first, &chain, true));
        let block = next_block(&chain, vec![first]);
        chain.append_block(block);

        // A second spend of the same output is a double spend...
        let mut second = signed_spend(&keys, Address("02cc".to_string()), 50);
        assert!(!check_transaction(&mut second, &chain, true));

        // ...but resolves fine when the caller skips the UTXO check
        assert!(check_transaction(&mut second, &chain, false));
    }

    #[test]
    fn test_negative_fee_fails() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);

        // Outputs worth more than the 50-coin input
        let mut tx = signed_spend(&keys, Address("02bb".to_string()), 51);
        assert!(!check_transaction(&mut tx, &chain, false));
    }

    #[test]
    fn test_zero_value_output_fails() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);

        let mut tx = Transaction::new(
            keys.address(),
            vec![TransactionInput::new(0, 0, 0)],
            vec![
                TransactionOutput::new(Address("02bb".to_string()), 10),
                TransactionOutput::new(Address("02cc".to_string()), 0),
            ],
        );
        keys.sign_transaction(&mut tx);

        assert!(!check_transaction(&mut tx, &chain, false));
    }

    #[test]
    fn test_coinbase_fee_is_zero() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);

        let mut coinbase = Transaction::coinbase(keys.address(), 45);
        keys.sign_transaction(&mut coinbase);

        assert!(check_transaction(&mut coinbase, &chain, true));
        assert_eq!(coinbase.fee, Some(0));
    }

    #[test]
    fn test_unsigned_transaction_fails() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);

        let mut tx = signed_spend(&keys, Address("02bb".to_string()), 10);
        tx.signature = None;
        assert!(!check_transaction(&mut tx, &chain, false));
    }

    #[test]
    fn test_check_block_accepts_proper_successor() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);
        let block = next_block(&chain, vec![signed_spend(&keys, Address("02bb".to_string()), 10)]);
        assert!(check_block(&block, chain.last_block()));
    }

    #[test]
    fn test_check_block_rejects_each_broken_rule() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);
        let good = next_block(&chain, vec![signed_spend(&keys, Address("02bb".to_string()), 10)]);
        let prev = chain.last_block();

        let mut wrong_index = good.clone();
        wrong_index.index = 5;
        assert!(!check_block(&wrong_index, prev));

        let mut wrong_link = good.clone();
        wrong_link.previous_block_hash = "bogus".to_string();
        assert!(!check_block(&wrong_link, prev));

        let mut empty = good.clone();
        empty.transactions.clear();
        assert!(!check_block(&empty, prev));

        let mut stale = good.clone();
        stale.timestamp = prev.timestamp;
        assert!(!check_block(&stale, prev));

        let mut bad_proof = good.clone();
        bad_proof.proof = good.proof + 1;
        // The next verifying proof is never the immediate successor here,
        // but guard against the freak case anyway
        if !verify_proof(prev.proof, bad_proof.proof, DIFFICULTY) {
            assert!(!check_block(&bad_proof, prev));
        }
    }

    #[test]
    fn test_chain_stays_valid_as_blocks_append() {
        let keys = Keypair::generate();
        let mut chain = funded_chain(&keys);
        assert!(check_chain(&chain));

        let block = next_block(&chain, vec![signed_spend(&keys, Address("02bb".to_string()), 10)]);
        chain.append_block(block);
        assert!(check_chain(&chain));

        let mut coinbase = Transaction::coinbase(keys.address(), Block::reward_at(2));
        keys.sign_transaction(&mut coinbase);
        let block = next_block(&chain, vec![coinbase]);
        chain.append_block(block);
        assert!(check_chain(&chain));
    }

    #[test]
    fn test_tampered_history_invalidates_chain() {
        let keys = Keypair::generate();
        let mut chain = funded_chain(&keys);
        for _ in 0..3 {
            let mut coinbase = Transaction::coinbase(keys.address(), 50);
            keys.sign_transaction(&mut coinbase);
            let block = next_block(&chain, vec![coinbase]);
            chain.append_block(block);
        }
        assert!(check_chain(&chain));

        // Mutating any accepted block breaks the downstream hash link
        chain.blocks[1].proof += 1;
        assert!(!check_chain(&chain));
    }

    #[test]
    fn test_utxo_membership_check_resolves_against_current_set() {
        let keys = Keypair::generate();
        let chain = funded_chain(&keys);

        let mut tx = signed_spend(&keys, Address("02bb".to_string()), 30);
        let outpoint = OutPoint::new(0, 0, 0);
        assert!(chain.utxo_set.contains(&outpoint));
        assert!(check_transaction(&mut tx, &chain, true));
    }
}
