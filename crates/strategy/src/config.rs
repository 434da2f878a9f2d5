use serde::{Deserialize, Serialize};

use common::{Error, Result, RiskParameters};

/// Strategy selection and parameters, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyKind {
    MaCross {
        #[serde(default = "default_fast")]
        fast_period: usize,
        #[serde(default = "default_slow")]
        slow_period: usize,
    },
    Rsi {
        #[serde(default = "default_rsi_period")]
        period: usize,
        #[serde(default = "default_oversold")]
        oversold: f64,
        #[serde(default = "default_overbought")]
        overbought: f64,
    },
}

fn default_fast() -> usize {
    10
}
fn default_slow() -> usize {
    30
}
fn default_rsi_period() -> usize {
    14
}
fn default_oversold() -> f64 {
    30.0
}
fn default_overbought() -> f64 {
    70.0
}

impl StrategyKind {
    /// Default parameters for a strategy name ("ma_cross" or "rsi").
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "ma_cross" => Ok(StrategyKind::MaCross {
                fast_period: default_fast(),
                slow_period: default_slow(),
            }),
            "rsi" => Ok(StrategyKind::Rsi {
                period: default_rsi_period(),
                oversold: default_oversold(),
                overbought: default_overbought(),
            }),
            other => Err(Error::Config(format!(
                "unknown strategy '{other}', expected 'ma_cross' or 'rsi'"
            ))),
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            StrategyKind::MaCross {
                fast_period,
                slow_period,
            } => {
                if fast_period == 0 || fast_period >= slow_period {
                    return Err(Error::Config(format!(
                        "ma_cross needs 0 < fast_period < slow_period, got {fast_period}/{slow_period}"
                    )));
                }
            }
            StrategyKind::Rsi {
                period,
                oversold,
                overbought,
            } => {
                if period == 0 {
                    return Err(Error::Config("rsi period must be > 0".to_string()));
                }
                if !(0.0..=100.0).contains(&oversold)
                    || !(0.0..=100.0).contains(&overbought)
                    || oversold >= overbought
                {
                    return Err(Error::Config(format!(
                        "rsi needs 0 <= oversold < overbought <= 100, got {oversold}/{overbought}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Optional strategy config file (TOML).
///
/// Example `config/strategy.toml`:
/// ```toml
/// [strategy]
/// type = "rsi"
/// period = 14
/// oversold = 30.0
/// overbought = 70.0
///
/// [risk]
/// stop_loss_pct = 0.02
/// take_profit_pct = 0.03
/// contract_multiplier = 1.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    pub strategy: StrategyKind,
    #[serde(default)]
    pub risk: RiskParameters,
}

impl StrategyFileConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content)?;
        cfg.strategy.validate()?;
        if cfg.risk.stop_loss_pct <= 0.0 || cfg.risk.take_profit_pct <= 0.0 {
            return Err(Error::Config(
                "stop_loss_pct and take_profit_pct must be positive".to_string(),
            ));
        }
        if cfg.risk.contract_multiplier < 1.0 {
            return Err(Error::Config(
                "contract_multiplier must be >= 1".to_string(),
            ));
        }
        Ok(cfg)
    }

    /// Defaults for a strategy name, with default risk parameters.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self {
            strategy: StrategyKind::from_name(name)?,
            risk: RiskParameters::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rsi_with_risk_table() {
        let cfg = StrategyFileConfig::parse(
            r#"
            [strategy]
            type = "rsi"
            period = 7

            [risk]
            stop_loss_pct = 0.01
            "#,
        )
        .unwrap();

        assert_eq!(
            cfg.strategy,
            StrategyKind::Rsi {
                period: 7,
                oversold: 30.0,
                overbought: 70.0
            }
        );
        assert_eq!(cfg.risk.stop_loss_pct, 0.01);
        assert_eq!(cfg.risk.take_profit_pct, 0.03);
        assert_eq!(cfg.risk.contract_multiplier, 1.0);
    }

    #[test]
    fn ma_cross_defaults() {
        let cfg = StrategyFileConfig::parse("[strategy]\ntype = \"ma_cross\"\n").unwrap();
        assert_eq!(
            cfg.strategy,
            StrategyKind::MaCross {
                fast_period: 10,
                slow_period: 30
            }
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(StrategyFileConfig::parse("[strategy]\ntype = \"bollinger\"\n").is_err());
        assert!(StrategyKind::from_name("bollinger").is_err());
    }

    #[test]
    fn inverted_ma_periods_are_rejected() {
        let err = StrategyFileConfig::parse(
            "[strategy]\ntype = \"ma_cross\"\nfast_period = 30\nslow_period = 10\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn from_name_uses_defaults() {
        let cfg = StrategyFileConfig::from_name("rsi").unwrap();
        assert!(matches!(cfg.strategy, StrategyKind::Rsi { period: 14, .. }));
        assert_eq!(cfg.risk, RiskParameters::default());
    }
}
