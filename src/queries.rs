use crate::{
    api::ReadOnlyCaller,
    contract::Contracts,
    decode::{
        self,
        GameState,
        LeaderboardEntry,
    },
    network::Network,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};

/// `Ok(None)` means the contract has no game for `principal`; transport and
/// node errors are reported separately as `Err`.
pub async fn fetch_game_state<R: ReadOnlyCaller>(
    reader: &R,
    contracts: &Contracts,
    network: Network,
    principal: &str,
) -> Result<Option<GameState>> {
    let call = contracts.get_state(network, principal)?;
    let value = reader
        .call_read_only(&call)
        .await
        .wrap_err_with(|| format!("failed to read game state for {principal}"))?;
    Ok(decode::game_state(&value))
}

pub async fn fetch_best_score<R: ReadOnlyCaller>(
    reader: &R,
    contracts: &Contracts,
    network: Network,
    principal: &str,
) -> Result<u64> {
    let call = contracts.get_best_score(network, principal)?;
    let value = reader
        .call_read_only(&call)
        .await
        .wrap_err_with(|| format!("failed to read best score for {principal}"))?;
    Ok(decode::best_score(&value))
}

pub async fn fetch_leaderboard<R: ReadOnlyCaller>(
    reader: &R,
    contracts: &Contracts,
    network: Network,
) -> Result<Vec<LeaderboardEntry>> {
    let call = contracts.get_leaderboard(network);
    let value = reader
        .call_read_only(&call)
        .await
        .wrap_err("failed to read leaderboard")?;
    Ok(decode::leaderboard(&value))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        clarity::ClarityValue,
        contract::{
            ContractId,
            GET_BEST_SCORE,
            GET_LEADERBOARD,
            GET_STATE,
        },
        test_helpers::FakeReader,
    };

    const DEPLOYER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
    const PLAYER: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

    fn contracts() -> Contracts {
        Contracts::new(
            ContractId::new(DEPLOYER, "activity"),
            ContractId::new(DEPLOYER, "reflex"),
        )
    }

    #[tokio::test]
    async fn fetch_game_state__decodes_some_tuple() {
        // given
        let reader = FakeReader::new().respond(
            GET_STATE,
            ClarityValue::some(ClarityValue::tuple([
                ("x", ClarityValue::UInt(3)),
                ("y", ClarityValue::UInt(7)),
                ("score", ClarityValue::UInt(12)),
                ("alive", ClarityValue::Bool(true)),
            ])),
        );

        // when
        let state = fetch_game_state(&reader, &contracts(), Network::Mainnet, PLAYER)
            .await
            .unwrap();

        // then
        assert_eq!(
            state,
            Some(GameState {
                x: 3,
                y: 7,
                score: 12,
                alive: true
            })
        );
        let calls = reader.calls();
        assert_eq!(calls[0].sender_address, PLAYER);
        assert_eq!(calls[0].network, Network::Mainnet);
    }

    #[tokio::test]
    async fn fetch_game_state__keeps_none_and_failure_apart() {
        // given
        let empty = FakeReader::new().respond(GET_STATE, ClarityValue::OptionalNone);
        let broken = FakeReader::new().fail(GET_STATE, "connection refused");

        // when
        let none = fetch_game_state(&empty, &contracts(), Network::Testnet, DEPLOYER).await;
        let failed =
            fetch_game_state(&broken, &contracts(), Network::Testnet, DEPLOYER).await;

        // then
        assert_eq!(none.unwrap(), None);
        assert!(failed.is_err());
    }

    #[tokio::test]
    async fn fetch_best_score__unwraps_ok_uint() {
        // given
        let reader = FakeReader::new()
            .respond(GET_BEST_SCORE, ClarityValue::ok(ClarityValue::UInt(198)));

        // when
        let best = fetch_best_score(&reader, &contracts(), Network::Testnet, PLAYER)
            .await
            .unwrap();

        // then
        assert_eq!(best, 198);
    }

    #[tokio::test]
    async fn fetch_best_score__invalid_principal_never_hits_node() {
        // given
        let reader = FakeReader::new().respond(GET_BEST_SCORE, ClarityValue::UInt(1));

        // when
        let result = fetch_best_score(&reader, &contracts(), Network::Testnet, "bogus").await;

        // then
        assert!(result.is_err());
        assert!(reader.calls().is_empty());
    }

    #[tokio::test]
    async fn fetch_leaderboard__filters_and_sorts() {
        // given
        let entry = |who: &str, score: u64| {
            ClarityValue::tuple([
                ("who", ClarityValue::principal(who).unwrap()),
                ("score", ClarityValue::uint(score)),
            ])
        };
        let reader = FakeReader::new().respond(
            GET_LEADERBOARD,
            ClarityValue::ok(ClarityValue::List(vec![
                entry(PLAYER, 300),
                entry(DEPLOYER, 100),
                entry("SP000000000000000000002Q6VF78", 250),
                entry(PLAYER, 0),
            ])),
        );

        // when
        let board = fetch_leaderboard(&reader, &contracts(), Network::Testnet)
            .await
            .unwrap();

        // then
        let scores: Vec<_> = board.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![250, 300]);
        assert_eq!(reader.calls()[0].sender_address, DEPLOYER);
    }
}
