use crate::{
    clarity::ClarityValue,
    network::Network,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::fmt;

pub const RECORD_ACTIVITY: &str = "record-activity";
pub const START_GAME: &str = "start-game";
pub const MOVE: &str = "move";
pub const SUBMIT_SCORE: &str = "submit-score";
pub const GET_STATE: &str = "get-state";
pub const GET_BEST_SCORE: &str = "get-best-score";
pub const GET_LEADERBOARD: &str = "get-leaderboard";

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContractId {
    pub address: String,
    pub name: String,
}

impl ContractId {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.name)
    }
}

/// A state-changing call, to be approved and signed by the wallet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContractCall {
    pub contract: ContractId,
    pub function_name: &'static str,
    pub function_args: Vec<ClarityValue>,
    pub network: Network,
}

impl ContractCall {
    /// Function name and rendered arguments, e.g. `move u2`.
    pub fn label(&self) -> String {
        std::iter::once(self.function_name.to_string())
            .chain(self.function_args.iter().map(describe_arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One-line description shown in approval prompts.
    pub fn summary(&self) -> String {
        let args = self
            .function_args
            .iter()
            .map(describe_arg)
            .collect::<Vec<_>>()
            .join(" ");
        if args.is_empty() {
            format!("({} {}) on {}", self.function_name, self.contract, self.network)
        } else {
            format!(
                "({} {} {}) on {}",
                self.function_name, self.contract, args, self.network
            )
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadOnlyCall {
    pub contract: ContractId,
    pub function_name: &'static str,
    pub function_args: Vec<ClarityValue>,
    pub sender_address: String,
    pub network: Network,
}

/// Snake movement. The contract interprets the codes; the client never
/// validates them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub fn code(self) -> u32 {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }

    pub fn arrow(self) -> char {
        match self {
            Direction::Up => '↑',
            Direction::Right => '→',
            Direction::Down => '↓',
            Direction::Left => '←',
        }
    }
}

/// Identities of the two deployed contract families.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Contracts {
    pub activity: ContractId,
    pub reflex: ContractId,
}

impl Contracts {
    pub fn new(activity: ContractId, reflex: ContractId) -> Self {
        Self { activity, reflex }
    }

    pub fn record_activity(&self, network: Network) -> ContractCall {
        self.call(&self.activity, RECORD_ACTIVITY, Vec::new(), network)
    }

    pub fn start_game(&self, network: Network) -> ContractCall {
        self.call(&self.activity, START_GAME, Vec::new(), network)
    }

    pub fn move_snake(&self, network: Network, direction: u32) -> ContractCall {
        self.call(
            &self.activity,
            MOVE,
            vec![ClarityValue::uint(direction)],
            network,
        )
    }

    pub fn submit_score(&self, network: Network, score_ms: u64) -> ContractCall {
        self.call(
            &self.reflex,
            SUBMIT_SCORE,
            vec![ClarityValue::uint(score_ms)],
            network,
        )
    }

    pub fn get_state(&self, network: Network, principal: &str) -> Result<ReadOnlyCall> {
        Ok(ReadOnlyCall {
            contract: self.activity.clone(),
            function_name: GET_STATE,
            function_args: vec![principal_arg(principal)?],
            sender_address: principal.to_string(),
            network,
        })
    }

    pub fn get_best_score(
        &self,
        network: Network,
        principal: &str,
    ) -> Result<ReadOnlyCall> {
        Ok(ReadOnlyCall {
            contract: self.reflex.clone(),
            function_name: GET_BEST_SCORE,
            function_args: vec![principal_arg(principal)?],
            sender_address: principal.to_string(),
            network,
        })
    }

    pub fn get_leaderboard(&self, network: Network) -> ReadOnlyCall {
        ReadOnlyCall {
            contract: self.reflex.clone(),
            function_name: GET_LEADERBOARD,
            function_args: Vec::new(),
            sender_address: self.reflex.address.clone(),
            network,
        }
    }

    fn call(
        &self,
        contract: &ContractId,
        function_name: &'static str,
        function_args: Vec<ClarityValue>,
        network: Network,
    ) -> ContractCall {
        ContractCall {
            contract: contract.clone(),
            function_name,
            function_args,
            network,
        }
    }
}

fn principal_arg(principal: &str) -> Result<ClarityValue> {
    ClarityValue::principal(principal)
        .wrap_err_with(|| format!("'{principal}' is not a valid principal"))
}

fn describe_arg(arg: &ClarityValue) -> String {
    match arg {
        ClarityValue::UInt(n) => format!("u{n}"),
        ClarityValue::Int(n) => n.to_string(),
        ClarityValue::Principal(p) => format!("'{p}"),
        other => other
            .to_hex()
            .unwrap_or_else(|_| String::from("<unencodable>")),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    const DEPLOYER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

    fn contracts() -> Contracts {
        Contracts::new(
            ContractId::new(DEPLOYER, "activity"),
            ContractId::new(DEPLOYER, "reflex"),
        )
    }

    #[test]
    fn move_snake__passes_out_of_range_direction_through() {
        // when
        let call = contracts().move_snake(Network::Testnet, 4);

        // then
        assert_eq!(call.function_name, MOVE);
        assert_eq!(call.function_args, vec![ClarityValue::UInt(4)]);
        assert_eq!(call.contract.name, "activity");
    }

    #[test]
    fn submit_score__targets_reflex_contract_with_uint_score() {
        // when
        let call = contracts().submit_score(Network::Mainnet, 231);

        // then
        assert_eq!(call.contract, ContractId::new(DEPLOYER, "reflex"));
        assert_eq!(call.function_name, SUBMIT_SCORE);
        assert_eq!(call.function_args, vec![ClarityValue::UInt(231)]);
        assert_eq!(call.network, Network::Mainnet);
    }

    #[test]
    fn record_activity__and_start_game_take_no_arguments() {
        let contracts = contracts();
        for (call, name) in [
            (contracts.record_activity(Network::Testnet), RECORD_ACTIVITY),
            (contracts.start_game(Network::Testnet), START_GAME),
        ] {
            assert_eq!(call.function_name, name);
            assert!(call.function_args.is_empty());
            assert_eq!(call.contract.name, "activity");
        }
    }

    #[test]
    fn get_state__executes_as_the_queried_principal() {
        // when
        let call = contracts().get_state(Network::Testnet, DEPLOYER).unwrap();

        // then
        assert_eq!(call.sender_address, DEPLOYER);
        assert_eq!(
            call.function_args,
            vec![ClarityValue::principal(DEPLOYER).unwrap()]
        );
        assert_eq!(call.function_name, GET_STATE);
    }

    #[test]
    fn get_state__rejects_malformed_principal() {
        assert!(contracts().get_state(Network::Testnet, "not-an-address").is_err());
    }

    #[test]
    fn get_leaderboard__executes_as_reflex_deployer() {
        // when
        let call = contracts().get_leaderboard(Network::Testnet);

        // then
        assert_eq!(call.sender_address, DEPLOYER);
        assert!(call.function_args.is_empty());
        assert_eq!(call.contract.name, "reflex");
    }

    #[test]
    fn direction__codes_cover_zero_to_three() {
        let codes: Vec<u32> = [
            Direction::Up,
            Direction::Right,
            Direction::Down,
            Direction::Left,
        ]
        .into_iter()
        .map(Direction::code)
        .collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn summary__renders_clarity_style_call() {
        let call = contracts().submit_score(Network::Testnet, 250);
        assert_eq!(
            call.summary(),
            format!("(submit-score {DEPLOYER}.reflex u250) on testnet")
        );
        assert_eq!(call.label(), "submit-score u250");
        assert_eq!(
            contracts().start_game(Network::Testnet).label(),
            "start-game"
        );
    }
}
