//! Batched, consistent reads of ERC-20 state.
//!
//! Every read goes out as a single `aggregate3` call against Multicall3 with
//! `allowFailure` unset, so either the whole batch succeeds against one block
//! or the read fails as a unit.

use {
    self::contracts::{ERC20, IMulticall3},
    alloy::{
        primitives::{Address, Bytes, U256},
        providers::{DynProvider, Provider, ProviderBuilder},
        sol_types::SolCall,
    },
    std::time::Duration,
    url::Url,
};

pub mod contracts;

/// A scalar field of an ERC-20 token contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarField {
    TotalSupply,
    Decimals,
}

impl ScalarField {
    fn calldata(self) -> Bytes {
        match self {
            Self::TotalSupply => ERC20::totalSupplyCall {}.abi_encode().into(),
            Self::Decimals => ERC20::decimalsCall {}.abi_encode().into(),
        }
    }

    fn decode(self, data: &[u8]) -> Result<U256, alloy::sol_types::Error> {
        match self {
            Self::TotalSupply => ERC20::totalSupplyCall::abi_decode_returns(data),
            Self::Decimals => ERC20::decimalsCall::abi_decode_returns(data).map(U256::from),
        }
    }
}

/// Reads token state from the chain. Results are aligned with the inputs and
/// partial results are never returned.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait ChainReading: Send + Sync + 'static {
    /// Reads the given fields of `contract` in one consistent snapshot.
    async fn read_scalar_fields(
        &self,
        contract: Address,
        fields: &[ScalarField],
    ) -> Result<Vec<U256>, Error>;

    /// Reads `balanceOf` of every holder in one consistent snapshot.
    async fn batch_balance_of(
        &self,
        contract: Address,
        holders: &[Address],
    ) -> Result<Vec<U256>, Error>;
}

/// Chain reader talking to an Ethereum JSON-RPC node.
#[derive(Clone)]
pub struct Ethereum {
    provider: DynProvider,
    multicall: Address,
    timeout: Duration,
}

impl Ethereum {
    pub fn new(url: Url, multicall: Address, timeout: Duration) -> Self {
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Self {
            provider,
            multicall,
            timeout,
        }
    }

    /// Executes all calls against `target` as a single all-or-nothing batch
    /// and returns the raw return data of each call in order.
    async fn aggregate(&self, target: Address, calls: Vec<Bytes>) -> Result<Vec<Bytes>, Error> {
        let len = calls.len();
        let calls = calls
            .into_iter()
            .map(|call_data| IMulticall3::Call3 {
                target,
                allowFailure: false,
                callData: call_data,
            })
            .collect::<Vec<_>>();

        let multicall = IMulticall3::new(self.multicall, &self.provider);
        let results = tokio::time::timeout(self.timeout, multicall.aggregate3(calls).call())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        if results.len() != len {
            return Err(Error::Malformed {
                expected: len,
                actual: results.len(),
            });
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result.success {
                true => Ok(result.returnData),
                false => Err(Error::CallFailed { index }),
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ChainReading for Ethereum {
    async fn read_scalar_fields(
        &self,
        contract: Address,
        fields: &[ScalarField],
    ) -> Result<Vec<U256>, Error> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let calls = fields.iter().map(|field| field.calldata()).collect();
        let data = self.aggregate(contract, calls).await?;
        fields
            .iter()
            .zip(&data)
            .enumerate()
            .map(|(index, (field, data))| {
                field
                    .decode(data)
                    .map_err(|source| Error::Decode { index, source })
            })
            .collect()
    }

    async fn batch_balance_of(
        &self,
        contract: Address,
        holders: &[Address],
    ) -> Result<Vec<U256>, Error> {
        if holders.is_empty() {
            return Ok(Vec::new());
        }
        let calls = holders
            .iter()
            .map(|&owner| ERC20::balanceOfCall { owner }.abi_encode().into())
            .collect();
        let data = self.aggregate(contract, calls).await?;
        data.iter()
            .enumerate()
            .map(|(index, data)| {
                ERC20::balanceOfCall::abi_decode_returns(data)
                    .map_err(|source| Error::Decode { index, source })
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("multicall failed: {0}")]
    Contract(#[from] alloy::contract::Error),
    #[error("call {index} of the batch reverted")]
    CallFailed { index: usize },
    #[error("failed to decode the result of call {index}: {source}")]
    Decode {
        index: usize,
        source: alloy::sol_types::Error,
    },
    #[error("expected {expected} results but node returned {actual}")]
    Malformed { expected: usize, actual: usize },
    #[error("node did not respond within {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::primitives::address,
        axum::{Json, Router, routing::post},
        serde_json::{Value, json},
        std::sync::Arc,
    };

    const TOKEN: Address = address!("0xaadd98Ad4660008C917C6FE7286Bc54b2eEF894d");

    fn holder(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    /// Serves a JSON-RPC node whose `eth_call` replies are produced by
    /// `respond` from the decoded `aggregate3` calls.
    async fn node(
        respond: impl Fn(Vec<IMulticall3::Call3>) -> Value + Send + Sync + 'static,
    ) -> Url {
        let respond = Arc::new(respond);
        let router = Router::new().route(
            "/",
            post(move |Json(request): Json<Value>| {
                let respond = respond.clone();
                async move {
                    let mut reply = match request["method"].as_str() {
                        Some("eth_call") => {
                            let tx = &request["params"][0];
                            let input = tx.get("input").or_else(|| tx.get("data")).unwrap();
                            let input: Bytes = serde_json::from_value(input.clone()).unwrap();
                            let call = IMulticall3::aggregate3Call::abi_decode(&input).unwrap();
                            respond(call.calls)
                        }
                        Some("eth_chainId") => json!({ "result": "0x1" }),
                        method => panic!("unexpected method {method:?}"),
                    };
                    reply["jsonrpc"] = json!("2.0");
                    reply["id"] = request["id"].clone();
                    Json(reply)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/").parse().unwrap()
    }

    fn results(results: Vec<(bool, Vec<u8>)>) -> Value {
        let results = results
            .into_iter()
            .map(|(success, data)| IMulticall3::Result {
                success,
                returnData: data.into(),
            })
            .collect::<Vec<_>>();
        let encoded = Bytes::from(IMulticall3::aggregate3Call::abi_encode_returns(&results));
        json!({ "result": encoded })
    }

    /// Answers every `balanceOf` with the last byte of the queried owner.
    fn balances(calls: Vec<IMulticall3::Call3>) -> Value {
        results(
            calls
                .into_iter()
                .map(|call| {
                    assert_eq!(call.target, TOKEN);
                    assert!(!call.allowFailure);
                    let owner = ERC20::balanceOfCall::abi_decode(&call.callData)
                        .unwrap()
                        .owner;
                    let balance = U256::from(owner[19]);
                    (true, ERC20::balanceOfCall::abi_encode_returns(&balance))
                })
                .collect(),
        )
    }

    fn ethereum(url: Url, timeout: Duration) -> Ethereum {
        Ethereum::new(url, contracts::MULTICALL3, timeout)
    }

    #[tokio::test]
    async fn balances_follow_holder_order() {
        let eth = ethereum(node(balances).await, Duration::from_secs(5));
        let holders = [holder(3), holder(1), holder(2)];
        let balances = eth.batch_balance_of(TOKEN, &holders).await.unwrap();
        assert_eq!(balances, [U256::from(3), U256::from(1), U256::from(2)]);
    }

    #[tokio::test]
    async fn reads_scalar_fields_in_request_order() {
        let supply = U256::from(1_000_000u64) * U256::from(10u64).pow(U256::from(18));
        let url = node(move |calls| {
            results(
                calls
                    .into_iter()
                    .map(|call| {
                        let selector: [u8; 4] = call.callData[..4].try_into().unwrap();
                        match selector {
                            ERC20::totalSupplyCall::SELECTOR => {
                                (true, ERC20::totalSupplyCall::abi_encode_returns(&supply))
                            }
                            ERC20::decimalsCall::SELECTOR => {
                                (true, ERC20::decimalsCall::abi_encode_returns(&18u8))
                            }
                            selector => panic!("unexpected selector {selector:?}"),
                        }
                    })
                    .collect(),
            )
        })
        .await;
        let eth = ethereum(url, Duration::from_secs(5));

        let fields = eth
            .read_scalar_fields(TOKEN, &[ScalarField::Decimals, ScalarField::TotalSupply])
            .await
            .unwrap();
        assert_eq!(fields, [U256::from(18), supply]);
    }

    #[tokio::test]
    async fn rpc_error_fails_the_whole_batch() {
        let url = node(|_| {
            json!({ "error": { "code": -32000, "message": "execution reverted" } })
        })
        .await;
        let eth = ethereum(url, Duration::from_secs(5));

        let result = eth.batch_balance_of(TOKEN, &[holder(1), holder(2)]).await;
        assert!(matches!(result, Err(Error::Contract(_))));
    }

    #[tokio::test]
    async fn failed_call_is_reported_by_index() {
        let url = node(|calls| {
            results(
                calls
                    .iter()
                    .enumerate()
                    .map(|(index, _)| (index != 1, Vec::new()))
                    .collect(),
            )
        })
        .await;
        let eth = ethereum(url, Duration::from_secs(5));

        let result = eth
            .batch_balance_of(TOKEN, &[holder(1), holder(2), holder(3)])
            .await;
        assert!(matches!(result, Err(Error::CallFailed { index: 1 })));
    }

    #[tokio::test]
    async fn short_result_is_malformed() {
        let url = node(|calls| balances(calls.into_iter().take(1).collect())).await;
        let eth = ethereum(url, Duration::from_secs(5));

        let result = eth.batch_balance_of(TOKEN, &[holder(1), holder(2)]).await;
        assert!(matches!(
            result,
            Err(Error::Malformed {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[tokio::test]
    async fn stalled_node_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _connection = listener.accept().await.unwrap();
            std::future::pending::<()>().await
        });
        let timeout = Duration::from_millis(100);
        let eth = ethereum(format!("http://{addr}/").parse().unwrap(), timeout);

        let result = eth.batch_balance_of(TOKEN, &[holder(1)]).await;
        assert!(matches!(result, Err(Error::Timeout(t)) if t == timeout));
    }

    #[tokio::test]
    async fn empty_batches_skip_the_node() {
        let url = node(|_| panic!("no request expected")).await;
        let eth = ethereum(url, Duration::from_secs(5));
        assert!(eth.batch_balance_of(TOKEN, &[]).await.unwrap().is_empty());
        assert!(eth.read_scalar_fields(TOKEN, &[]).await.unwrap().is_empty());
    }

    #[test]
    fn encodes_erc20_selectors() {
        assert_eq!(
            ScalarField::TotalSupply.calldata()[..],
            [0x18, 0x16, 0x0d, 0xdd]
        );
        assert_eq!(
            ScalarField::Decimals.calldata()[..],
            [0x31, 0x3c, 0xe5, 0x67]
        );

        let owner = address!("0x000000000000000000000000000000000000dEaD");
        let call = ERC20::balanceOfCall { owner }.abi_encode();
        assert_eq!(call[..4], [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(call[16..], owner[..]);
    }

    #[test]
    fn decodes_scalar_fields() {
        let mut word = [0u8; 32];
        word[31] = 18;
        assert_eq!(
            ScalarField::Decimals.decode(&word).unwrap(),
            U256::from(18)
        );

        let supply = U256::from(1_000_000u64) * U256::from(10u64).pow(U256::from(18));
        assert_eq!(
            ScalarField::TotalSupply
                .decode(&supply.to_be_bytes::<32>())
                .unwrap(),
            supply
        );
    }

    #[test]
    fn rejects_truncated_return_data() {
        assert!(ScalarField::TotalSupply.decode(&[0u8; 4]).is_err());
    }

    #[test]
    fn multicall_is_checksummed() {
        assert_eq!(
            contracts::MULTICALL3.to_checksum(None),
            "0xcA11bde05977b3631167028862bE2a173976CA11"
        );
    }
}
