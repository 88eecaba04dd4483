//! Scenario tests driving both replicas of a pool through the packet flow.
//!
//! Two mock chains are wired together by relaying each emitted packet into
//! the counterparty's receive handler and the resulting acknowledgement back
//! into the initiator, the way an ordered-channel relayer would.

use crate::contract::{execute, instantiate, query};
use crate::ibc::{
    ibc_channel_connect, ibc_channel_open, ibc_packet_ack, ibc_packet_receive, ibc_packet_timeout,
};
use crate::math;
use crate::msg::{
    ExecuteMsg, InstantiateMsg, InterchainSwapAck, LocalDeposit, MsgCreatePool, MsgDoubleDeposit,
    MsgDoubleDepositResponse, MsgSingleDeposit, MsgSwap, MsgWithdraw, QueryMsg, RemoteDeposit,
};
use crate::state::{generate_pool_id, Pool};
use crate::ContractError;
use cosmwasm_std::testing::{mock_dependencies, mock_env, mock_info, MockApi, MockQuerier, MockStorage};
use cosmwasm_std::{
    coin, coins, from_binary, Addr, BankMsg, Binary, Coin, CosmosMsg, Decimal256,
    IbcAcknowledgement, IbcBasicResponse, IbcChannel, IbcChannelConnectMsg, IbcChannelOpenMsg,
    IbcEndpoint, IbcMsg, IbcOrder, IbcPacket, IbcPacketAckMsg, IbcPacketReceiveMsg,
    IbcPacketTimeoutMsg, IbcReceiveResponse, OwnedDeps, Response, SubMsg, Uint128,
};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use proptest::prelude::*;
use serde::de::DeserializeOwned;

const ATOM: &str = "atom";
const OSMO: &str = "osmo";
const VERSION: &str = crate::state::IBC_VERSION;

type Chain = OwnedDeps<MockStorage, MockApi, MockQuerier>;

fn endpoint(port: &str, channel: &str) -> IbcEndpoint {
    IbcEndpoint {
        port_id: port.to_string(),
        channel_id: channel.to_string(),
    }
}

struct TestPair {
    a: Chain,
    b: Chain,
    a_end: IbcEndpoint,
    b_end: IbcEndpoint,
    next_seq: u64,
}

fn open_and_connect(
    chain: &mut Chain,
    ours: &IbcEndpoint,
    theirs: &IbcEndpoint,
) -> Result<(), ContractError> {
    let channel = IbcChannel::new(
        ours.clone(),
        theirs.clone(),
        IbcOrder::Ordered,
        VERSION,
        "connection-0",
    );
    ibc_channel_open(
        chain.as_mut(),
        mock_env(),
        IbcChannelOpenMsg::OpenInit {
            channel: channel.clone(),
        },
    )?;
    ibc_channel_connect(
        chain.as_mut(),
        mock_env(),
        IbcChannelConnectMsg::OpenAck {
            channel,
            counterparty_version: VERSION.to_string(),
        },
    )?;
    Ok(())
}

fn setup_pair() -> Result<TestPair, ContractError> {
    let a_end = endpoint("wasm.swap-a", "channel-0");
    let b_end = endpoint("wasm.swap-b", "channel-1");
    let mut a = mock_dependencies();
    let mut b = mock_dependencies();
    // Give each chain a circulating supply of its native denom so side
    // classification has something to observe.
    a.querier.update_balance("reserve", coins(1_000_000_000_000, ATOM));
    b.querier.update_balance("reserve", coins(1_000_000_000_000, OSMO));
    for chain in [&mut a, &mut b] {
        instantiate(
            chain.as_mut(),
            mock_env(),
            mock_info("admin", &[]),
            InstantiateMsg {
                fee_rate: 30,
                packet_lifetime: 600,
            },
        )?;
    }
    open_and_connect(&mut a, &a_end, &b_end)?;
    open_and_connect(&mut b, &b_end, &a_end)?;
    Ok(TestPair {
        a,
        b,
        a_end,
        b_end,
        next_seq: 1,
    })
}

/// Pulls the emitted `IbcMsg::SendPacket` out of a delegator response.
fn sent_packet(res: &Response, seq: u64, src: &IbcEndpoint, dest: &IbcEndpoint) -> IbcPacket {
    for sub in &res.messages {
        if let CosmosMsg::Ibc(IbcMsg::SendPacket {
            channel_id,
            data,
            timeout,
        }) = &sub.msg
        {
            assert_eq!(channel_id, &src.channel_id);
            return IbcPacket::new(data.clone(), src.clone(), dest.clone(), seq, timeout.clone());
        }
    }
    panic!("delegator response emitted no packet");
}

fn deliver(chain: &mut Chain, packet: IbcPacket) -> IbcReceiveResponse {
    ibc_packet_receive(
        chain.as_mut(),
        mock_env(),
        IbcPacketReceiveMsg::new(packet, Addr::unchecked("relayer")),
    )
    .unwrap()
}

fn acknowledge(
    chain: &mut Chain,
    packet: IbcPacket,
    ack: Binary,
) -> Result<IbcBasicResponse, ContractError> {
    ibc_packet_ack(
        chain.as_mut(),
        mock_env(),
        IbcPacketAckMsg::new(IbcAcknowledgement::new(ack), packet, Addr::unchecked("relayer")),
    )
}

impl TestPair {
    /// Relays the packet in `res` from chain A into chain B and the
    /// acknowledgement back, returning both handler responses.
    fn relay_a_to_b(
        &mut self,
        res: &Response,
    ) -> Result<(IbcReceiveResponse, IbcBasicResponse), ContractError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let packet = sent_packet(res, seq, &self.a_end, &self.b_end);
        let receive = deliver(&mut self.b, packet.clone());
        let ack = acknowledge(&mut self.a, packet, receive.acknowledgement.clone())?;
        Ok((receive, ack))
    }

    fn pool_on_a(&self, pool_id: &str) -> Pool {
        query_pool(&self.a, pool_id)
    }

    fn pool_on_b(&self, pool_id: &str) -> Pool {
        query_pool(&self.b, pool_id)
    }
}

fn query_pool(chain: &Chain, pool_id: &str) -> Pool {
    from_binary(
        &query(
            chain.as_ref(),
            mock_env(),
            QueryMsg::Pool {
                pool_id: pool_id.to_string(),
            },
        )
        .unwrap(),
    )
    .unwrap()
}

fn lp_of(chain: &Chain, pool_id: &str, owner: &str) -> Uint128 {
    let balance: Coin = from_binary(
        &query(
            chain.as_ref(),
            mock_env(),
            QueryMsg::LpBalance {
                pool_id: pool_id.to_string(),
                owner: owner.to_string(),
            },
        )
        .unwrap(),
    )
    .unwrap();
    balance.amount
}

fn escrow_of(chain: &Chain, channel_id: &str, denom: &str) -> Uint128 {
    let balance: Coin = from_binary(
        &query(
            chain.as_ref(),
            mock_env(),
            QueryMsg::EscrowBalance {
                channel_id: channel_id.to_string(),
                denom: denom.to_string(),
            },
        )
        .unwrap(),
    )
    .unwrap();
    balance.amount
}

fn ack_result<T: DeserializeOwned>(receive: &IbcReceiveResponse) -> T {
    match from_binary(&receive.acknowledgement).unwrap() {
        InterchainSwapAck::Result(data) => from_binary(&data).unwrap(),
        InterchainSwapAck::Error(err) => panic!("handler failed: {err}"),
    }
}

fn ack_error(receive: &IbcReceiveResponse) -> String {
    match from_binary(&receive.acknowledgement).unwrap() {
        InterchainSwapAck::Result(_) => panic!("handler unexpectedly succeeded"),
        InterchainSwapAck::Error(err) => err,
    }
}

fn bank_sends(msgs: &[SubMsg]) -> Vec<(String, Vec<Coin>)> {
    msgs.iter()
        .filter_map(|sub| match &sub.msg {
            CosmosMsg::Bank(BankMsg::Send { to_address, amount }) => {
                Some((to_address.clone(), amount.clone()))
            }
            _ => None,
        })
        .collect()
}

fn create_pool(pair: &mut TestPair) -> Result<String, ContractError> {
    let msg = MsgCreatePool {
        source_port: pair.a_end.port_id.clone(),
        source_channel: pair.a_end.channel_id.clone(),
        sender: "alice".to_string(),
        denoms: [ATOM.to_string(), OSMO.to_string()],
        decimals: [6, 6],
        weight: "50:50".to_string(),
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &[]),
        ExecuteMsg::CreatePool(msg),
    )?;
    pair.relay_a_to_b(&res)?;
    Ok(generate_pool_id(&[ATOM.to_string(), OSMO.to_string()]))
}

const BOB_KEY: [u8; 32] = [7u8; 32];

fn sign_remote_order(key_bytes: &[u8; 32], sender: &str, sequence: u64, token: &Coin) -> (Binary, Binary) {
    let key = SigningKey::from_slice(key_bytes).unwrap();
    let order = RemoteDeposit {
        sender: sender.to_string(),
        sequence,
        token: token.clone(),
        signature: Binary::default(),
        pub_key: Binary::default(),
    };
    let hash = order.sign_doc_hash().unwrap();
    let signature: Signature = key.sign_prehash(&hash).unwrap();
    let signature = signature.normalize_s().unwrap_or(signature);
    let pub_key = key.verifying_key().to_encoded_point(true).as_bytes().to_vec();
    (
        Binary::from(signature.to_bytes().as_slice()),
        Binary::from(pub_key),
    )
}

/// Seeds the pool with 1e6 on each side: bob pre-funds his leg on chain B
/// and signs the order alice submits on chain A.
fn seed_pool(pair: &mut TestPair, pool_id: &str) -> Result<MsgDoubleDepositResponse, ContractError> {
    execute(
        pair.b.as_mut(),
        mock_env(),
        mock_info("bob", &coins(1_000_000, OSMO)),
        ExecuteMsg::FundRemoteDeposit {},
    )?;
    let remote_token = coin(1_000_000, OSMO);
    let (signature, pub_key) = sign_remote_order(&BOB_KEY, "bob", 0, &remote_token);
    let msg = MsgDoubleDeposit {
        pool_id: pool_id.to_string(),
        local_deposit: LocalDeposit {
            sender: "alice".to_string(),
            token: coin(1_000_000, ATOM),
        },
        remote_deposit: RemoteDeposit {
            sender: "bob".to_string(),
            sequence: 0,
            token: remote_token,
            signature,
            pub_key,
        },
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(1_000_000, ATOM)),
        ExecuteMsg::DoubleDeposit(msg),
    )?;
    let (receive, _) = pair.relay_a_to_b(&res)?;
    Ok(ack_result(&receive))
}

fn left_swap_msg(amount_in: u128, expected_out: u128, slippage: u64) -> MsgSwap {
    MsgSwap {
        sender: "alice".to_string(),
        token_in: coin(amount_in, ATOM),
        token_out: coin(expected_out, OSMO),
        slippage,
        recipient: "carol".to_string(),
    }
}

fn weighted_invariant(pool: &Pool) -> Decimal256 {
    let mut value = Decimal256::one();
    for asset in &pool.assets {
        if asset.balance.amount.is_zero() {
            return Decimal256::zero();
        }
        value = value
            * math::pow(
                math::to_decimal(asset.balance.amount),
                Decimal256::percent(asset.weight as u64),
            )
            .unwrap();
    }
    value
}

#[test]
fn proper_instantiation() -> Result<(), ContractError> {
    let mut deps = mock_dependencies();
    instantiate(
        deps.as_mut(),
        mock_env(),
        mock_info("admin", &[]),
        InstantiateMsg {
            fee_rate: 30,
            packet_lifetime: 600,
        },
    )?;
    let config: crate::state::Config =
        from_binary(&query(deps.as_ref(), mock_env(), QueryMsg::Config {})?)?;
    assert_eq!(config.admin, Addr::unchecked("admin"));
    assert_eq!(config.fee_rate, 30);
    assert_eq!(config.packet_lifetime, 600);
    Ok(())
}

#[test]
fn instantiation_rejects_absurd_fee() {
    let mut deps = mock_dependencies();
    let res = instantiate(
        deps.as_mut(),
        mock_env(),
        mock_info("admin", &[]),
        InstantiateMsg {
            fee_rate: 10_000,
            packet_lifetime: 600,
        },
    );
    assert!(matches!(res, Err(ContractError::InvalidRequest { .. })));
}

#[test]
fn handshake_rejects_unordered_channels() {
    let mut deps = mock_dependencies();
    let channel = IbcChannel::new(
        endpoint("wasm.swap-a", "channel-0"),
        endpoint("wasm.swap-b", "channel-1"),
        IbcOrder::Unordered,
        VERSION,
        "connection-0",
    );
    let res = ibc_channel_open(
        deps.as_mut(),
        mock_env(),
        IbcChannelOpenMsg::OpenInit { channel },
    );
    assert!(matches!(
        res,
        Err(ContractError::OrderedChannelRequired {})
    ));
}

#[test]
fn handshake_rejects_foreign_versions() {
    let mut deps = mock_dependencies();
    let channel = IbcChannel::new(
        endpoint("wasm.swap-a", "channel-0"),
        endpoint("wasm.swap-b", "channel-1"),
        IbcOrder::Ordered,
        "ics20-1",
        "connection-0",
    );
    let res = ibc_channel_open(
        deps.as_mut(),
        mock_env(),
        IbcChannelOpenMsg::OpenInit { channel },
    );
    assert!(matches!(
        res,
        Err(ContractError::InvalidChannelVersion { .. })
    ));
}

#[test]
fn create_pool_mirrors_with_inverted_sides() -> Result<(), ContractError> {
    use crate::state::{PoolSide, PoolStatus};

    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;

    let on_a = pair.pool_on_a(&pool_id);
    let on_b = pair.pool_on_b(&pool_id);
    assert_eq!(on_a.status, PoolStatus::Initial);
    assert_eq!(on_b.status, PoolStatus::Initial);
    assert_eq!(on_a.find_asset(ATOM).unwrap().side, PoolSide::Native);
    assert_eq!(on_a.find_asset(OSMO).unwrap().side, PoolSide::Remote);
    assert_eq!(on_b.find_asset(ATOM).unwrap().side, PoolSide::Remote);
    assert_eq!(on_b.find_asset(OSMO).unwrap().side, PoolSide::Native);
    assert_eq!(on_a.side_asset(PoolSide::Native).balance.denom, ATOM);
    assert_eq!(on_b.side_asset(PoolSide::Native).balance.denom, OSMO);
    assert_eq!(on_a.counterparty_channel, "channel-1");
    assert_eq!(on_b.counterparty_channel, "channel-0");
    assert_eq!(on_a.supply.denom, pool_id);

    // A fresh pool has no price yet.
    let price = query(
        pair.a.as_ref(),
        mock_env(),
        QueryMsg::MarketPrice {
            pool_id: pool_id.clone(),
            denom_in: ATOM.to_string(),
            denom_out: OSMO.to_string(),
        },
    );
    assert!(price.is_err());
    Ok(())
}

#[test]
fn create_pool_rejects_duplicates() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    create_pool(&mut pair)?;
    let msg = MsgCreatePool {
        source_port: pair.a_end.port_id.clone(),
        source_channel: pair.a_end.channel_id.clone(),
        sender: "alice".to_string(),
        denoms: [OSMO.to_string(), ATOM.to_string()],
        decimals: [6, 6],
        weight: "50:50".to_string(),
    };
    // Same pair in the other order resolves to the same pool id.
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &[]),
        ExecuteMsg::CreatePool(msg),
    );
    assert!(matches!(res, Err(ContractError::PoolAlreadyExists { .. })));
    Ok(())
}

#[test]
fn create_pool_requires_a_registered_channel() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let msg = MsgCreatePool {
        source_port: pair.a_end.port_id.clone(),
        source_channel: "channel-9".to_string(),
        sender: "alice".to_string(),
        denoms: [ATOM.to_string(), OSMO.to_string()],
        decimals: [6, 6],
        weight: "50:50".to_string(),
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &[]),
        ExecuteMsg::CreatePool(msg),
    );
    assert!(matches!(res, Err(ContractError::UnknownChannel { .. })));
    Ok(())
}

#[test]
fn single_deposit_into_unseeded_pool_is_rejected() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    let msg = MsgSingleDeposit {
        pool_id,
        sender: "alice".to_string(),
        tokens: vec![coin(1_000_000, ATOM)],
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(1_000_000, ATOM)),
        ExecuteMsg::SingleDeposit(msg),
    );
    assert!(matches!(res, Err(ContractError::EmptyPool { .. })));
    Ok(())
}

#[test]
fn seed_double_deposit_readies_both_mirrors() -> Result<(), ContractError> {
    use crate::state::PoolStatus;

    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    let issued = seed_pool(&mut pair, &pool_id)?;

    let on_a = pair.pool_on_a(&pool_id);
    let on_b = pair.pool_on_b(&pool_id);
    assert_eq!(on_a.status, PoolStatus::Ready);
    assert_eq!(on_b.status, PoolStatus::Ready);
    assert_eq!(on_a.find_asset(ATOM).unwrap().balance.amount.u128(), 1_000_000);
    assert_eq!(on_a.find_asset(OSMO).unwrap().balance.amount.u128(), 1_000_000);
    assert_eq!(on_a.supply, on_b.supply);

    // Total issuance is the weighted geometric mean of the two legs, give
    // or take kernel rounding, split between the depositors.
    let total = issued.pool_tokens[0].amount + issued.pool_tokens[1].amount;
    assert!((999_998..=1_000_000).contains(&total.u128()));
    assert_eq!(on_a.supply.amount, total);
    assert_eq!(lp_of(&pair.a, &pool_id, "alice"), issued.pool_tokens[0].amount);
    assert_eq!(lp_of(&pair.b, &pool_id, "bob"), issued.pool_tokens[1].amount);

    // Each chain escrows its native side of the liquidity.
    assert_eq!(escrow_of(&pair.a, "channel-0", ATOM).u128(), 1_000_000);
    assert_eq!(escrow_of(&pair.b, "channel-1", OSMO).u128(), 1_000_000);

    // Balanced 50:50 liquidity prices at par.
    let price: Decimal256 = from_binary(&query(
        pair.a.as_ref(),
        mock_env(),
        QueryMsg::MarketPrice {
            pool_id: pool_id.clone(),
            denom_in: ATOM.to_string(),
            denom_out: OSMO.to_string(),
        },
    )?)?;
    assert_eq!(price, Decimal256::one());
    Ok(())
}

#[test]
fn single_deposit_after_seed_updates_both_mirrors() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;
    let supply_before = pair.pool_on_a(&pool_id).supply.amount;
    let alice_before = lp_of(&pair.a, &pool_id, "alice");

    let msg = MsgSingleDeposit {
        pool_id: pool_id.clone(),
        sender: "alice".to_string(),
        tokens: vec![coin(100_000, ATOM)],
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(100_000, ATOM)),
        ExecuteMsg::SingleDeposit(msg),
    )?;
    pair.relay_a_to_b(&res)?;

    let on_a = pair.pool_on_a(&pool_id);
    let on_b = pair.pool_on_b(&pool_id);
    assert_eq!(on_a.find_asset(ATOM).unwrap().balance.amount.u128(), 1_100_000);
    assert_eq!(on_b.find_asset(ATOM).unwrap().balance.amount.u128(), 1_100_000);
    // 1e6 * (1.1^0.5 - 1) issues 48808 LP against a 1e6 supply; seeds a few
    // atomics short of 1e6 issue the same whole amount.
    let minted = on_a.supply.amount.checked_sub(supply_before)?;
    assert_eq!(minted.u128(), 48_808);
    assert_eq!(
        lp_of(&pair.a, &pool_id, "alice").checked_sub(alice_before)?,
        minted
    );
    assert_eq!(on_a.supply, on_b.supply);
    assert_eq!(escrow_of(&pair.a, "channel-0", ATOM).u128(), 1_100_000);
    Ok(())
}

#[test]
fn left_swap_pays_the_recipient_on_the_counterparty() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;
    let v_before = weighted_invariant(&pair.pool_on_b(&pool_id));

    // 100000 in at 30 bps: effective 99700, payout 1e6 * 99700 / 1099700.
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(100_000, ATOM)),
        ExecuteMsg::LeftSwap(left_swap_msg(100_000, 90_000, 100)),
    )?;
    let (receive, _) = pair.relay_a_to_b(&res)?;

    let sends = bank_sends(&receive.messages);
    assert_eq!(sends, vec![("carol".to_string(), coins(90_661, OSMO))]);

    let on_a = pair.pool_on_a(&pool_id);
    let on_b = pair.pool_on_b(&pool_id);
    assert_eq!(on_a.find_asset(ATOM).unwrap().balance.amount.u128(), 1_100_000);
    assert_eq!(on_a.find_asset(OSMO).unwrap().balance.amount.u128(), 909_339);
    assert_eq!(
        on_a.find_asset(OSMO).unwrap().balance.amount,
        on_b.find_asset(OSMO).unwrap().balance.amount
    );

    // The fee stays in the pool, growing the weighted invariant.
    assert!(weighted_invariant(&on_b) >= v_before);

    // Input escrow grows on A, output escrow shrinks on B; both track the
    // native-side balances exactly.
    assert_eq!(escrow_of(&pair.a, "channel-0", ATOM).u128(), 1_100_000);
    assert_eq!(escrow_of(&pair.b, "channel-1", OSMO).u128(), 909_339);
    Ok(())
}

#[test]
fn right_swap_settles_cost_and_refunds_the_slack() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;

    // Buying 50000 osmo from a balanced 1e6/1e6 pool costs
    // 1e6 * 50000 / 950000 = 52631.57 before the fee, 52790 after.
    let msg = MsgSwap {
        sender: "bob".to_string(),
        token_in: coin(53_000, ATOM),
        token_out: coin(50_000, OSMO),
        slippage: 100,
        recipient: "carol".to_string(),
    };
    let cap = msg.right_swap_cap()?;
    assert_eq!(cap.u128(), 53_530);
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("bob", &coins(cap.u128(), ATOM)),
        ExecuteMsg::RightSwap(msg),
    )?;
    let (receive, ack) = pair.relay_a_to_b(&res)?;

    // The recipient gets exactly what was asked for, on chain B.
    assert_eq!(
        bank_sends(&receive.messages),
        vec![("carol".to_string(), coins(50_000, OSMO))]
    );
    // The unused escrow above the settled cost flows back on chain A.
    assert_eq!(
        bank_sends(&ack.messages),
        vec![("bob".to_string(), coins(53_530 - 52_790, ATOM))]
    );

    let on_a = pair.pool_on_a(&pool_id);
    let on_b = pair.pool_on_b(&pool_id);
    assert_eq!(on_a.find_asset(ATOM).unwrap().balance.amount.u128(), 1_052_790);
    assert_eq!(on_a.find_asset(OSMO).unwrap().balance.amount.u128(), 950_000);
    assert_eq!(
        on_a.find_asset(ATOM).unwrap().balance.amount,
        on_b.find_asset(ATOM).unwrap().balance.amount
    );
    assert_eq!(escrow_of(&pair.a, "channel-0", ATOM).u128(), 1_052_790);
    assert_eq!(escrow_of(&pair.b, "channel-1", OSMO).u128(), 950_000);
    Ok(())
}

#[test]
fn slippage_violation_refunds_the_escrow() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;
    let before_a = pair.pool_on_a(&pool_id);
    let before_b = pair.pool_on_b(&pool_id);

    // Expecting 100000 out with 0.5% tolerance needs at least 99500; the
    // curve only yields 90661.
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(100_000, ATOM)),
        ExecuteMsg::LeftSwap(left_swap_msg(100_000, 100_000, 50)),
    )?;
    let (receive, ack) = pair.relay_a_to_b(&res)?;

    assert!(ack_error(&receive).contains("Slippage exceeded"));
    assert!(receive.messages.is_empty());
    // The error acknowledgement releases the full escrowed input.
    assert_eq!(
        bank_sends(&ack.messages),
        vec![("alice".to_string(), coins(100_000, ATOM))]
    );
    assert_eq!(pair.pool_on_a(&pool_id), before_a);
    assert_eq!(pair.pool_on_b(&pool_id), before_b);
    assert_eq!(escrow_of(&pair.a, "channel-0", ATOM).u128(), 1_000_000);
    Ok(())
}

#[test]
fn timeout_refunds_the_escrow() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;
    let before_a = pair.pool_on_a(&pool_id);

    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(100_000, ATOM)),
        ExecuteMsg::LeftSwap(left_swap_msg(100_000, 90_000, 100)),
    )?;
    // The relayer never delivers; the transport reports a timeout instead.
    let packet = sent_packet(&res, 2, &pair.a_end, &pair.b_end);
    let timeout = ibc_packet_timeout(
        pair.a.as_mut(),
        mock_env(),
        IbcPacketTimeoutMsg::new(packet, Addr::unchecked("relayer")),
    )?;
    assert_eq!(
        bank_sends(&timeout.messages),
        vec![("alice".to_string(), coins(100_000, ATOM))]
    );
    assert_eq!(pair.pool_on_a(&pool_id), before_a);
    assert_eq!(escrow_of(&pair.a, "channel-0", ATOM).u128(), 1_000_000);
    Ok(())
}

#[test]
fn withdraw_burns_lp_and_pays_from_local_escrow() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;
    let alice_lp = lp_of(&pair.a, &pool_id, "alice");
    let supply_before = pair.pool_on_a(&pool_id).supply.amount;

    let msg = MsgWithdraw {
        sender: "alice".to_string(),
        pool_coin: coin(100_000, pool_id.clone()),
        denom_out: ATOM.to_string(),
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &[]),
        ExecuteMsg::Withdraw(msg),
    )?;
    let (_, ack) = pair.relay_a_to_b(&res)?;

    // Redeeming a tenth of the supply pays (1 - 0.9^2) = 19% of the side.
    assert_eq!(
        bank_sends(&ack.messages),
        vec![("alice".to_string(), coins(190_000, ATOM))]
    );
    let on_a = pair.pool_on_a(&pool_id);
    let on_b = pair.pool_on_b(&pool_id);
    assert_eq!(on_a.find_asset(ATOM).unwrap().balance.amount.u128(), 810_000);
    assert_eq!(on_a.supply.amount, supply_before.checked_sub(Uint128::new(100_000))?);
    assert_eq!(on_a.supply, on_b.supply);
    assert_eq!(
        lp_of(&pair.a, &pool_id, "alice"),
        alice_lp.checked_sub(Uint128::new(100_000))?
    );
    assert_eq!(escrow_of(&pair.a, "channel-0", ATOM).u128(), 810_000);
    Ok(())
}

#[test]
fn withdraw_is_rejected_before_readiness() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    let msg = MsgWithdraw {
        sender: "alice".to_string(),
        pool_coin: coin(100, pool_id),
        denom_out: ATOM.to_string(),
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &[]),
        ExecuteMsg::Withdraw(msg),
    );
    assert!(matches!(res, Err(ContractError::PoolNotReady { .. })));
    Ok(())
}

#[test]
fn double_deposit_rejects_a_bad_signature() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    execute(
        pair.b.as_mut(),
        mock_env(),
        mock_info("bob", &coins(1_000_000, OSMO)),
        ExecuteMsg::FundRemoteDeposit {},
    )?;
    let remote_token = coin(1_000_000, OSMO);
    // Signed over a different sequence, so verification fails.
    let (signature, pub_key) = sign_remote_order(&BOB_KEY, "bob", 5, &remote_token);
    let msg = MsgDoubleDeposit {
        pool_id: pool_id.clone(),
        local_deposit: LocalDeposit {
            sender: "alice".to_string(),
            token: coin(1_000_000, ATOM),
        },
        remote_deposit: RemoteDeposit {
            sender: "bob".to_string(),
            sequence: 0,
            token: remote_token,
            signature,
            pub_key,
        },
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(1_000_000, ATOM)),
        ExecuteMsg::DoubleDeposit(msg),
    )?;
    let (receive, ack) = pair.relay_a_to_b(&res)?;

    assert!(ack_error(&receive).contains("signature"));
    // The local leg flows back to alice; bob's pre-placed funds are intact.
    assert_eq!(
        bank_sends(&ack.messages),
        vec![("alice".to_string(), coins(1_000_000, ATOM))]
    );
    let bob_funds: Coin = from_binary(&query(
        pair.b.as_ref(),
        mock_env(),
        QueryMsg::RemoteFunds {
            sender: "bob".to_string(),
            denom: OSMO.to_string(),
        },
    )?)?;
    assert_eq!(bob_funds.amount.u128(), 1_000_000);
    assert_eq!(pair.pool_on_b(&pool_id).supply.amount, Uint128::zero());
    Ok(())
}

#[test]
fn double_deposit_rejects_a_replayed_sequence() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;

    // Replay the same signed order: sequence 0 was consumed by the seed.
    execute(
        pair.b.as_mut(),
        mock_env(),
        mock_info("bob", &coins(1_000_000, OSMO)),
        ExecuteMsg::FundRemoteDeposit {},
    )?;
    let remote_token = coin(1_000_000, OSMO);
    let (signature, pub_key) = sign_remote_order(&BOB_KEY, "bob", 0, &remote_token);
    let msg = MsgDoubleDeposit {
        pool_id,
        local_deposit: LocalDeposit {
            sender: "alice".to_string(),
            token: coin(1_000_000, ATOM),
        },
        remote_deposit: RemoteDeposit {
            sender: "bob".to_string(),
            sequence: 0,
            token: remote_token,
            signature,
            pub_key,
        },
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(1_000_000, ATOM)),
        ExecuteMsg::DoubleDeposit(msg),
    )?;
    let (receive, _) = pair.relay_a_to_b(&res)?;
    assert!(ack_error(&receive).contains("sequence"));
    Ok(())
}

#[test]
fn malformed_packets_produce_an_error_ack() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let packet = IbcPacket::new(
        Binary::from(b"not an envelope".to_vec()),
        pair.a_end.clone(),
        pair.b_end.clone(),
        1,
        cosmwasm_std::IbcTimeout::with_timestamp(mock_env().block.time.plus_seconds(60)),
    );
    let receive = deliver(&mut pair.b, packet);
    ack_error(&receive);
    Ok(())
}

#[test]
fn mirrors_agree_after_a_mixed_flow() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;

    let deposit = MsgSingleDeposit {
        pool_id: pool_id.clone(),
        sender: "alice".to_string(),
        tokens: vec![coin(250_000, ATOM)],
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(250_000, ATOM)),
        ExecuteMsg::SingleDeposit(deposit),
    )?;
    pair.relay_a_to_b(&res)?;

    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &coins(80_000, ATOM)),
        ExecuteMsg::LeftSwap(left_swap_msg(80_000, 50_000, 1_000)),
    )?;
    pair.relay_a_to_b(&res)?;

    let buy = MsgSwap {
        sender: "bob".to_string(),
        token_in: coin(40_000, ATOM),
        token_out: coin(30_000, OSMO),
        slippage: 2_000,
        recipient: "carol".to_string(),
    };
    let cap = buy.right_swap_cap()?;
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("bob", &coins(cap.u128(), ATOM)),
        ExecuteMsg::RightSwap(buy),
    )?;
    pair.relay_a_to_b(&res)?;

    let withdraw = MsgWithdraw {
        sender: "alice".to_string(),
        pool_coin: coin(150_000, pool_id.clone()),
        denom_out: ATOM.to_string(),
    };
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("alice", &[]),
        ExecuteMsg::Withdraw(withdraw),
    )?;
    pair.relay_a_to_b(&res)?;

    let on_a = pair.pool_on_a(&pool_id);
    let on_b = pair.pool_on_b(&pool_id);
    assert_eq!(on_a.supply, on_b.supply);
    assert_eq!(on_a.status, on_b.status);
    for denom in [ATOM, OSMO] {
        let a_asset = on_a.find_asset(denom).unwrap();
        let b_asset = on_b.find_asset(denom).unwrap();
        assert_eq!(a_asset.balance, b_asset.balance);
        assert_eq!(a_asset.weight, b_asset.weight);
        assert_ne!(a_asset.side, b_asset.side);
    }
    // Escrow on each chain still backs its native side to the token.
    assert_eq!(
        escrow_of(&pair.a, "channel-0", ATOM),
        on_a.find_asset(ATOM).unwrap().balance.amount
    );
    assert_eq!(
        escrow_of(&pair.b, "channel-1", OSMO),
        on_b.find_asset(OSMO).unwrap().balance.amount
    );
    Ok(())
}

#[test]
fn swaps_never_shrink_the_weighted_invariant() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let pool_id = create_pool(&mut pair)?;
    seed_pool(&mut pair, &pool_id)?;

    let mut last = weighted_invariant(&pair.pool_on_b(&pool_id));
    for amount in [10_000u128, 50_000, 120_000] {
        let res = execute(
            pair.a.as_mut(),
            mock_env(),
            mock_info("alice", &coins(amount, ATOM)),
            ExecuteMsg::LeftSwap(left_swap_msg(amount, 1, 10_000)),
        )?;
        pair.relay_a_to_b(&res)?;
        let next = weighted_invariant(&pair.pool_on_b(&pool_id));
        assert!(next >= last, "invariant shrank: {next} < {last}");
        last = next;
    }
    Ok(())
}

#[test]
fn reclaiming_unused_remote_funds_pays_them_back() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    execute(
        pair.b.as_mut(),
        mock_env(),
        mock_info("bob", &coins(500, OSMO)),
        ExecuteMsg::FundRemoteDeposit {},
    )?;
    let res = execute(
        pair.b.as_mut(),
        mock_env(),
        mock_info("bob", &[]),
        ExecuteMsg::ReclaimRemoteFunds {
            denom: OSMO.to_string(),
            amount: Uint128::new(200),
        },
    )?;
    assert_eq!(
        bank_sends(&res.messages),
        vec![("bob".to_string(), coins(200, OSMO))]
    );
    let left: Coin = from_binary(&query(
        pair.b.as_ref(),
        mock_env(),
        QueryMsg::RemoteFunds {
            sender: "bob".to_string(),
            denom: OSMO.to_string(),
        },
    )?)?;
    assert_eq!(left.amount.u128(), 300);
    // More than the remainder is refused.
    let res = execute(
        pair.b.as_mut(),
        mock_env(),
        mock_info("bob", &[]),
        ExecuteMsg::ReclaimRemoteFunds {
            denom: OSMO.to_string(),
            amount: Uint128::new(400),
        },
    );
    assert!(matches!(res, Err(ContractError::InsufficientBalance { .. })));
    Ok(())
}

#[test]
fn update_config_is_admin_gated() -> Result<(), ContractError> {
    let mut pair = setup_pair()?;
    let res = execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("mallory", &[]),
        ExecuteMsg::UpdateConfig {
            fee_rate: Some(100),
            packet_lifetime: None,
            admin: None,
        },
    );
    assert!(matches!(res, Err(ContractError::Unauthorized {})));
    execute(
        pair.a.as_mut(),
        mock_env(),
        mock_info("admin", &[]),
        ExecuteMsg::UpdateConfig {
            fee_rate: Some(100),
            packet_lifetime: None,
            admin: None,
        },
    )?;
    let config: crate::state::Config =
        from_binary(&query(pair.a.as_ref(), mock_env(), QueryMsg::Config {})?)?;
    assert_eq!(config.fee_rate, 100);
    Ok(())
}

proptest! {
    #[test]
    fn pool_id_ignores_denom_order(a in "[a-z]{3,12}", b in "[a-z]{3,12}") {
        prop_assume!(a != b);
        let forward = generate_pool_id(&[a.clone(), b.clone()]);
        let backward = generate_pool_id(&[b, a]);
        prop_assert_eq!(&forward, &backward);
        prop_assert!(forward.starts_with("pool"));
    }

    #[test]
    fn weight_strings_only_parse_when_they_sum_to_100(a in 1u32..200, b in 1u32..200) {
        let parsed = crate::msg::parse_weights(&format!("{a}:{b}"));
        if a + b == 100 && (1..=99).contains(&a) {
            prop_assert!(parsed.is_ok());
        } else {
            prop_assert!(parsed.is_err());
        }
    }

    #[test]
    fn zero_fee_round_trips_never_profit(amount in 1u128..500_000) {
        use crate::amm::InterchainMarketMaker;
        use crate::state::{PoolAsset, PoolSide};

        let mut pool = Pool::try_new(
            [
                PoolAsset {
                    side: PoolSide::Native,
                    balance: coin(1_000_000, ATOM),
                    weight: 50,
                    decimal: 6,
                },
                PoolAsset {
                    side: PoolSide::Remote,
                    balance: coin(1_000_000, OSMO),
                    weight: 50,
                    decimal: 6,
                },
            ],
            "wasm.peer".to_string(),
            "channel-7".to_string(),
        )
        .unwrap();
        pool.supply.amount = Uint128::new(1_000_000);

        let sold = coin(amount, ATOM);
        let out = InterchainMarketMaker::new(&pool, 0)
            .left_swap(&sold, OSMO)
            .unwrap();
        prop_assume!(!out.amount.is_zero());
        pool.apply_swap(&sold, &out).unwrap();
        let back = InterchainMarketMaker::new(&pool, 0)
            .left_swap(&out, ATOM)
            .unwrap();
        prop_assert!(back.amount.u128() <= amount);
    }
}
