use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Preprod,
    Preview,
    Sanchonet,
    Devnet,
}

impl Network {
    pub fn magic(&self) -> u64 {
        match self {
            Network::Mainnet => 764824073,
            Network::Preprod => 1,
            Network::Preview => 2,
            Network::Sanchonet => 4,
            Network::Devnet => 42,
        }
    }

    /// Network id carried in address headers
    pub fn id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            _ => 0,
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "preprod" => Ok(Network::Preprod),
            "preview" => Ok(Network::Preview),
            "sanchonet" => Ok(Network::Sanchonet),
            "devnet" => Ok(Network::Devnet),
            _ => Err(format!(
                "unknown network {s}, valid networks are: `mainnet`, `preprod`, `preview`, `sanchonet`, `devnet`"
            )),
        }
    }
}
