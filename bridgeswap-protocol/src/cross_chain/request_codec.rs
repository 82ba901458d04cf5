// Wire format of the request carried from the origin to the destination network.
//
// Layout: abi.encode(uint8 version, bytes32 id, bytes[][] swaps, address receiver,
//                    bool nativeOut, uint256 fee, bool allowPartialFill)

use crate::cross_chain::types::RouterError;
use crate::data_structures::{Request, SwapLeg, SwapRoute, TransferDescription};
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;

pub const PAYLOAD_VERSION: u8 = 1;

fn payload_layout() -> Vec<ParamType> {
    vec![
        ParamType::Uint(8),
        ParamType::FixedBytes(32),
        ParamType::Array(Box::new(ParamType::Array(Box::new(ParamType::Bytes)))),
        ParamType::Address,
        ParamType::Bool,
        ParamType::Uint(256),
        ParamType::Bool,
    ]
}

fn routes_token(routes: &[SwapRoute]) -> Token {
    Token::Array(
        routes
            .iter()
            .map(|route| {
                Token::Array(
                    route
                        .legs
                        .iter()
                        .map(|leg| Token::Bytes(leg.call_data.to_vec()))
                        .collect(),
                )
            })
            .collect(),
    )
}

fn encode_parts(
    id: H256,
    routes: &[SwapRoute],
    receiver: Address,
    native_out: bool,
    fee: U256,
    allow_partial_fill: bool,
) -> Bytes {
    abi::encode(&[
        Token::Uint(U256::from(PAYLOAD_VERSION)),
        Token::FixedBytes(id.as_bytes().to_vec()),
        routes_token(routes),
        Token::Address(receiver),
        Token::Bool(native_out),
        Token::Uint(fee),
        Token::Bool(allow_partial_fill),
    ])
    .into()
}

/// Builds the payload for a request. Pure: the same inputs always yield the same bytes.
pub fn encode(id: H256, description: &TransferDescription, dst_swaps: &[SwapRoute]) -> Bytes {
    encode_parts(
        id,
        dst_swaps,
        description.receiver,
        description.native_out,
        description.fee,
        description.allow_partial_fill,
    )
}

pub fn encode_request(request: &Request) -> Bytes {
    encode_parts(
        request.id,
        &request.swaps,
        request.receiver,
        request.native_out,
        request.fee,
        request.allow_partial_fill,
    )
}

/// Strict inverse of [`encode`]. Anything that does not re-encode to exactly
/// the same bytes is rejected.
pub fn decode(payload: &[u8]) -> Result<Request, RouterError> {
    let tokens = abi::decode(&payload_layout(), payload)
        .map_err(|e| RouterError::MalformedPayload(e.to_string()))?;

    let request = match tokens.as_slice() {
        [Token::Uint(version), Token::FixedBytes(id), Token::Array(routes), Token::Address(receiver), Token::Bool(native_out), Token::Uint(fee), Token::Bool(allow_partial_fill)] =>
        {
            if *version != U256::from(PAYLOAD_VERSION) {
                return Err(RouterError::MalformedPayload(format!("unsupported version {}", version)));
            }
            if id.len() != 32 {
                return Err(RouterError::MalformedPayload("request id is not 32 bytes".to_string()));
            }
            Request {
                id: H256::from_slice(id),
                swaps: decode_routes(routes)?,
                receiver: *receiver,
                native_out: *native_out,
                fee: *fee,
                allow_partial_fill: *allow_partial_fill,
            }
        }
        _ => return Err(RouterError::MalformedPayload("unexpected payload layout".to_string())),
    };

    if encode_request(&request).as_ref() != payload {
        return Err(RouterError::MalformedPayload("payload is not canonically encoded".to_string()));
    }
    Ok(request)
}

fn decode_routes(routes: &[Token]) -> Result<Vec<SwapRoute>, RouterError> {
    routes
        .iter()
        .map(|route| match route {
            Token::Array(legs) => legs
                .iter()
                .map(|leg| match leg {
                    Token::Bytes(call_data) => Ok(SwapLeg::new(call_data.clone())),
                    _ => Err(RouterError::MalformedPayload("swap leg is not bytes".to_string())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(SwapRoute::new),
            _ => Err(RouterError::MalformedPayload("swap route is not an array".to_string())),
        })
        .collect()
}

/// keccak256(abi.encode(caller, receiver, chainId, nonce)). Unique only as long
/// as the caller never reuses a nonce on the same network.
pub fn request_id(caller: Address, receiver: Address, chain_id: u64, nonce: u64) -> H256 {
    H256::from(keccak256(abi::encode(&[
        Token::Address(caller),
        Token::Address(receiver),
        Token::Uint(U256::from(chain_id)),
        Token::Uint(U256::from(nonce)),
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::interface::BridgeSelector;

    fn description() -> TransferDescription {
        TransferDescription {
            receiver: Address::repeat_byte(0x42),
            dst_chain_id: 2,
            max_slippage_bps: 50,
            bridge: BridgeSelector(1),
            nonce: 7,
            native_out: true,
            fee: U256::from(1_000),
            fee_deadline: 10_000,
            fee_signature: Bytes::default(),
            amount_in: U256::from(5_000),
            token_in: Address::repeat_byte(0x01),
            allow_partial_fill: true,
        }
    }

    fn routes() -> Vec<SwapRoute> {
        vec![
            SwapRoute::new(vec![SwapLeg::new(vec![1, 2, 3, 4, 5]), SwapLeg::new(vec![9; 40])]),
            SwapRoute::single(SwapLeg::new(vec![0xAA, 0xBB, 0xCC, 0xDD])),
        ]
    }

    #[test]
    fn decode_restores_request() {
        let id = H256::repeat_byte(0x99);
        let payload = encode(id, &description(), &routes());
        let request = decode(&payload).unwrap();

        assert_eq!(request.id, id);
        assert_eq!(request.swaps, routes());
        assert_eq!(request.receiver, Address::repeat_byte(0x42));
        assert!(request.native_out);
        assert_eq!(request.fee, U256::from(1_000));
        assert!(request.allow_partial_fill);
        assert_eq!(encode_request(&request), payload);
    }

    #[test]
    fn encoding_is_deterministic() {
        let id = H256::repeat_byte(1);
        assert_eq!(encode(id, &description(), &routes()), encode(id, &description(), &routes()));
        assert_ne!(encode(id, &description(), &routes()), encode(id, &description(), &[]));
    }

    #[test]
    fn empty_destination_swaps_survive() {
        let payload = encode(H256::zero(), &description(), &[]);
        assert!(decode(&payload).unwrap().swaps.is_empty());
    }

    #[test]
    fn rejects_truncated_trailing_and_unknown_version() {
        let payload = encode(H256::repeat_byte(3), &description(), &routes());

        assert!(matches!(decode(&payload[..payload.len() - 1]), Err(RouterError::MalformedPayload(_))));
        assert!(matches!(decode(&[]), Err(RouterError::MalformedPayload(_))));

        let mut padded = payload.to_vec();
        padded.extend_from_slice(&[0u8; 32]);
        assert!(matches!(decode(&padded), Err(RouterError::MalformedPayload(_))));

        let mut wrong_version = payload.to_vec();
        wrong_version[31] = 2;
        let err = decode(&wrong_version).unwrap_err();
        assert_eq!(err, RouterError::MalformedPayload("unsupported version 2".to_string()));
    }

    #[test]
    fn request_id_is_sensitive_to_every_input() {
        let caller = Address::repeat_byte(1);
        let receiver = Address::repeat_byte(2);
        let id = request_id(caller, receiver, 1, 0);

        assert_eq!(id, request_id(caller, receiver, 1, 0));
        assert_ne!(id, request_id(receiver, receiver, 1, 0));
        assert_ne!(id, request_id(caller, caller, 1, 0));
        assert_ne!(id, request_id(caller, receiver, 2, 0));
        assert_ne!(id, request_id(caller, receiver, 1, 1));
    }
}
