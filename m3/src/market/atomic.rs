//! Maker market adaptor
//!
//! Reads the open offers of the maker market contract and settles matches
//! atomically through the trade proxy contract. Transactions are sent from
//! the node's coinbase account, which the node signs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::json;

use crate::book::{Match, Order, OrderSide};
use crate::logger::Logger;
use crate::market::abi::{self, Address, Token};
use crate::market::ipc::IpcClient;
use crate::market::{Market, MarketError};

const LAST_OFFER_ID: &str = "last_offer_id()";
const OFFERS: &str = "offers(uint256)";
const TRADE: &str = "trade(address,uint256,uint256,uint256)";

/// One entry of the market's `offers` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub sell_how_much: u128,
    pub sell_which_token: Address,
    pub buy_how_much: u128,
    pub buy_which_token: Address,
    pub owner: Address,
    pub active: bool,
}

impl Offer {
    /// Decodes the `offers(uint256)` return data. `None` for amounts wider
    /// than 128 bits.
    pub fn decode(data: &[u8]) -> Result<Option<Offer>, MarketError> {
        let words = abi::decode_words(data, 6)?;
        let (Some(sell_how_much), Some(buy_how_much)) =
            (abi::word_to_u128(&words[0]), abi::word_to_u128(&words[2]))
        else {
            return Ok(None);
        };
        Ok(Some(Offer {
            sell_how_much,
            sell_which_token: abi::word_to_address(&words[1]),
            buy_how_much,
            buy_which_token: abi::word_to_address(&words[3]),
            owner: abi::word_to_address(&words[4]),
            active: abi::word_to_bool(&words[5]),
        }))
    }

    /// Normalizes the offer onto its pair. The lower token address is the
    /// base; selling the base makes an ask, selling the quote makes a bid.
    ///
    /// `Ok(None)` for offers that are not tradable (inactive, empty or same
    /// token on both sides), `Err` when the amounts do not fit a `Decimal`.
    pub fn to_order(&self, id: u64) -> Result<Option<Order>, MarketError> {
        if !self.active || self.sell_how_much == 0 || self.buy_how_much == 0 {
            return Ok(None);
        }
        if self.sell_which_token == self.buy_which_token {
            return Ok(None);
        }

        let out_of_range = || {
            MarketError::Decode(format!(
                "amounts {} / {} out of decimal range",
                self.sell_how_much, self.buy_how_much
            ))
        };
        let sell = Decimal::from_u128(self.sell_how_much).ok_or_else(out_of_range)?;
        let buy = Decimal::from_u128(self.buy_how_much).ok_or_else(out_of_range)?;
        let owner = self.owner.to_string();

        if self.sell_which_token < self.buy_which_token {
            let pair = format!("{}/{}", self.sell_which_token, self.buy_which_token);
            let price = buy.checked_div(sell).ok_or_else(out_of_range)?;
            Ok(Some(Order::new(id, pair, OrderSide::Sell, price, sell, owner)))
        } else {
            let pair = format!("{}/{}", self.buy_which_token, self.sell_which_token);
            let price = sell.checked_div(buy).ok_or_else(out_of_range)?;
            Ok(Some(Order::new(id, pair, OrderSide::Buy, price, buy, owner)))
        }
    }
}

pub struct AtomicMarket {
    rpc: IpcClient,
    maker: Address,
    proxy: Address,
    from: String,
    logger: Arc<dyn Logger>,
}

impl AtomicMarket {
    /// Connects to the node and resolves the sending account.
    pub async fn connect<P: AsRef<Path>>(
        ipc: P,
        maker: &str,
        proxy: &str,
        call_timeout: Duration,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, MarketError> {
        let maker: Address = maker.parse()?;
        let proxy: Address = proxy.parse()?;
        let rpc = IpcClient::connect(ipc, call_timeout).await?;
        let from: String = rpc.call("eth_coinbase", json!([])).await?;
        logger.info(format_args!(
            "connected to {} (account {}, maker {}, proxy {})",
            rpc.path().display(),
            from,
            maker,
            proxy
        ));
        Ok(AtomicMarket {
            rpc,
            maker,
            proxy,
            from,
            logger,
        })
    }

    async fn call_maker(&self, data: Vec<u8>) -> Result<Vec<u8>, MarketError> {
        let result: String = self
            .rpc
            .call(
                "eth_call",
                json!([{"to": self.maker.to_string(), "data": abi::to_hex(&data)}, "latest"]),
            )
            .await?;
        abi::from_hex(&result)
    }

    async fn last_offer_id(&self) -> Result<u64, MarketError> {
        let data = self.call_maker(abi::encode_call(LAST_OFFER_ID, &[])).await?;
        let words = abi::decode_words(&data, 1)?;
        abi::word_to_u128(&words[0])
            .and_then(|id| u64::try_from(id).ok())
            .ok_or_else(|| MarketError::Decode("last offer id out of range".to_string()))
    }
}

#[async_trait]
impl Market for AtomicMarket {
    async fn orders(&self) -> Result<Vec<Order>, MarketError> {
        let last = self.last_offer_id().await?;
        let mut orders = Vec::new();
        for id in 1..=last {
            let data = self
                .call_maker(abi::encode_call(OFFERS, &[Token::Uint(id.into())]))
                .await?;
            let Some(offer) = Offer::decode(&data)? else {
                self.logger
                    .warning(format_args!("offer #{} amounts out of range, skipped", id));
                continue;
            };
            match offer.to_order(id) {
                Ok(order) => orders.extend(order),
                Err(e) => self
                    .logger
                    .warning(format_args!("offer #{} skipped: {}", id, e)),
            }
        }
        self.logger.debug(format_args!(
            "read {} open orders out of {} offers",
            orders.len(),
            last
        ));
        Ok(orders)
    }

    async fn execute(&self, candidate: &Match) -> Result<(), MarketError> {
        let quantity = candidate
            .quantity
            .trunc()
            .to_u128()
            .filter(|q| *q > 0)
            .ok_or_else(|| MarketError::InvalidMatch(format!("quantity {}", candidate.quantity)))?;
        let data = abi::encode_call(
            TRADE,
            &[
                Token::Address(self.maker),
                Token::Uint(candidate.bid_id.into()),
                Token::Uint(candidate.ask_id.into()),
                Token::Uint(quantity),
            ],
        );
        let tx: String = self
            .rpc
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": self.from,
                    "to": self.proxy.to_string(),
                    "data": abi::to_hex(&data),
                }]),
            )
            .await?;
        self.logger
            .notice(format_args!("match {} submitted in {}", candidate.id, tx));
        Ok(())
    }

    async fn close(&self) -> Result<(), MarketError> {
        if self.rpc.close().await {
            self.logger
                .info(format_args!("closed connection to {}", self.rpc.path().display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NopLogger;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{UnixListener, UnixStream};
    use uuid::Uuid;

    const LOW: &str = "0x1000000000000000000000000000000000000000";
    const HIGH: &str = "0x2000000000000000000000000000000000000000";
    const MAKER: &str = "0x5661e7bc2403c7cc08df539e4a8e2972ec256d11";
    const PROXY: &str = "0x5661e7bc2403c7cc08df539e4a8e2972ec256d12";

    fn offer_data(sell: u128, sell_token: &str, buy: u128, buy_token: &str, active: bool) -> Vec<u8> {
        let owner: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let mut data = Vec::new();
        for token in [
            Token::Uint(sell),
            Token::Address(sell_token.parse().unwrap()),
            Token::Uint(buy),
            Token::Address(buy_token.parse().unwrap()),
            Token::Address(owner),
            Token::Uint(active as u128),
        ] {
            // reuse call encoding and strip the selector
            data.extend_from_slice(&abi::encode_call("x()", &[token])[4..]);
        }
        data
    }

    #[test]
    fn test_offer_selling_base_is_ask() {
        let offer = Offer::decode(&offer_data(10, LOW, 1000, HIGH, true))
            .unwrap()
            .unwrap();
        let order = offer.to_order(3).unwrap().unwrap();
        assert_eq!(order.id, 3);
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.pair, format!("{}/{}", LOW, HIGH));
        assert_eq!(order.price, dec!(100));
        assert_eq!(order.quantity, dec!(10));
        assert_eq!(order.owner, "0x00000000000000000000000000000000000000aa");
    }

    #[test]
    fn test_offer_selling_quote_is_bid() {
        let offer = Offer::decode(&offer_data(500, HIGH, 5, LOW, true))
            .unwrap()
            .unwrap();
        let order = offer.to_order(4).unwrap().unwrap();
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.pair, format!("{}/{}", LOW, HIGH));
        assert_eq!(order.price, dec!(100));
        assert_eq!(order.quantity, dec!(5));
    }

    #[test]
    fn test_inactive_and_empty_offers_are_skipped() {
        let inactive = Offer::decode(&offer_data(10, LOW, 10, HIGH, false)).unwrap().unwrap();
        assert_eq!(inactive.to_order(1).unwrap(), None);
        let empty = Offer::decode(&offer_data(0, LOW, 10, HIGH, true)).unwrap().unwrap();
        assert_eq!(empty.to_order(1).unwrap(), None);
        let same_token = Offer::decode(&offer_data(1, LOW, 1, LOW, true)).unwrap().unwrap();
        assert_eq!(same_token.to_order(1).unwrap(), None);
    }

    #[test]
    fn test_offer_beyond_decimal_range_is_an_error() {
        let huge = Offer::decode(&offer_data(1 << 100, LOW, 5, HIGH, true))
            .unwrap()
            .unwrap();
        assert!(matches!(huge.to_order(1), Err(MarketError::Decode(_))));

        let huge_bid = Offer::decode(&offer_data(5, HIGH, 1 << 100, LOW, true))
            .unwrap()
            .unwrap();
        assert!(matches!(huge_bid.to_order(2), Err(MarketError::Decode(_))));
    }

    #[test]
    fn test_offer_decode_rejects_short_data() {
        assert!(Offer::decode(&[0u8; 64]).is_err());
    }

    async fn reply_to(stream: &mut UnixStream, buf: &mut Vec<u8>, respond: impl Fn(&Value) -> Value) {
        let request = loop {
            let mut values = serde_json::Deserializer::from_slice(buf).into_iter::<Value>();
            if let Some(Ok(value)) = values.next() {
                let consumed = values.byte_offset();
                buf.drain(..consumed);
                break value;
            }
            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0);
            buf.extend_from_slice(&chunk[..n]);
        };
        let reply = json!({"jsonrpc": "2.0", "id": request["id"], "result": respond(&request)});
        stream.write_all(reply.to_string().as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_and_execute_against_node() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geth.ipc");
        let listener = UnixListener::bind(&path).unwrap();

        let node = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();

            reply_to(&mut stream, &mut buf, |r| {
                assert_eq!(r["method"], "eth_coinbase");
                json!("0x00000000000000000000000000000000000000cc")
            })
            .await;

            reply_to(&mut stream, &mut buf, |r| {
                assert_eq!(r["method"], "eth_call");
                assert_eq!(r["params"][0]["to"], MAKER);
                let mut last = vec![0u8; 32];
                last[31] = 2;
                json!(abi::to_hex(&last))
            })
            .await;
            reply_to(&mut stream, &mut buf, |_| json!(abi::to_hex(&offer_data(10, LOW, 1000, HIGH, true)))).await;
            reply_to(&mut stream, &mut buf, |_| json!(abi::to_hex(&offer_data(500, HIGH, 5, LOW, true)))).await;

            reply_to(&mut stream, &mut buf, |r| {
                assert_eq!(r["method"], "eth_sendTransaction");
                assert_eq!(r["params"][0]["to"], PROXY);
                assert_eq!(r["params"][0]["from"], "0x00000000000000000000000000000000000000cc");
                let data = abi::from_hex(r["params"][0]["data"].as_str().unwrap()).unwrap();
                assert_eq!(&data[..4], &abi::selector(TRADE));
                assert_eq!(data.len(), 4 + 4 * 32);
                assert_eq!(data[4 + 32 + 31], 2);
                assert_eq!(data[4 + 64 + 31], 1);
                assert_eq!(data[4 + 96 + 31], 5);
                json!("0xfeed")
            })
            .await;
        });

        let market = AtomicMarket::connect(&path, MAKER, PROXY, Duration::from_secs(5), Arc::new(NopLogger))
            .await
            .unwrap();
        let orders = market.orders().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[1].side, OrderSide::Buy);

        let candidate = Match {
            id: Uuid::new_v4(),
            pair: orders[0].pair.clone(),
            bid_id: 2,
            ask_id: 1,
            price: dec!(100),
            quantity: dec!(5),
        };
        market.execute(&candidate).await.unwrap();
        node.await.unwrap();

        market.close().await.unwrap();
        market.close().await.unwrap();
        assert!(matches!(market.orders().await, Err(MarketError::Closed)));
    }

    #[derive(Default)]
    struct WarningLog(std::sync::Mutex<Vec<String>>);

    impl Logger for WarningLog {
        fn critical(&self, _: std::fmt::Arguments<'_>) {}
        fn error(&self, _: std::fmt::Arguments<'_>) {}
        fn warning(&self, args: std::fmt::Arguments<'_>) {
            self.0.lock().unwrap().push(args.to_string());
        }
        fn notice(&self, _: std::fmt::Arguments<'_>) {}
        fn info(&self, _: std::fmt::Arguments<'_>) {}
        fn debug(&self, _: std::fmt::Arguments<'_>) {}
    }

    #[tokio::test]
    async fn test_snapshot_warns_on_offer_beyond_decimal_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geth.ipc");
        let listener = UnixListener::bind(&path).unwrap();

        let node = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            reply_to(&mut stream, &mut buf, |_| json!("0x00000000000000000000000000000000000000cc")).await;
            reply_to(&mut stream, &mut buf, |_| {
                let mut last = vec![0u8; 32];
                last[31] = 2;
                json!(abi::to_hex(&last))
            })
            .await;
            reply_to(&mut stream, &mut buf, |_| json!(abi::to_hex(&offer_data(1 << 100, LOW, 5, HIGH, true)))).await;
            reply_to(&mut stream, &mut buf, |_| json!(abi::to_hex(&offer_data(500, HIGH, 5, LOW, true)))).await;
        });

        let log = Arc::new(WarningLog::default());
        let market = AtomicMarket::connect(&path, MAKER, PROXY, Duration::from_secs(5), log.clone())
            .await
            .unwrap();
        let orders = market.orders().await.unwrap();
        node.await.unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, 2);
        let warnings = log.0.lock().unwrap().clone();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("offer #1 skipped"), "{}", warnings[0]);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_address() {
        let result = AtomicMarket::connect(
            "/nonexistent/geth.ipc",
            "0x12",
            PROXY,
            Duration::from_secs(1),
            Arc::new(NopLogger),
        )
        .await;
        assert!(matches!(result, Err(MarketError::InvalidAddress(_))));
    }
}
