//! Staking parameters of a test case
//!
//! One section per operation family. A scenario only reads the sections it
//! needs; [`StakingParameters::validate`] checks those sections before any
//! account exists or any RPC is made.

use crate::error::ParameterError;
use crate::executor::{NonceSelection, SubmitOptions};
use crate::funding::{calculate_funding_details, sum_amounts, FundingDetails};
use crate::keys::EditMode;
use crate::test_case::ScenarioKind;
use serde::{Deserialize, Serialize};
use staking_common::staking::{validate_commission_rate, Description, GasParams, PayloadError};
use staking_common::{Amount, Decimal};
use std::fmt;
use std::time::Duration;

fn default_nonce() -> i64 {
    -1
}

fn default_timeout() -> u64 {
    60
}

fn default_bls_key_count() -> usize {
    1
}

fn default_commission_rate() -> Decimal {
    Decimal::zero()
}

fn default_repeat() -> u32 {
    1
}

fn default_renew() -> bool {
    true
}

/// Scenario-wide behaviour switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioMode {
    #[default]
    Standard,
    /// Renew scenario: send one more participant renew after the regular ones
    RepeatRenew,
}

impl fmt::Display for ScenarioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::RepeatRenew => f.write_str("repeat_renew"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateValidatorParameters {
    pub amount: Option<Amount>,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,
    #[serde(default)]
    pub max_total_delegation: Option<Amount>,
    #[serde(default)]
    pub description: Description,
    #[serde(default = "default_bls_key_count")]
    pub bls_key_count: usize,
    /// Message signed by the proof of possession, empty for the default one
    #[serde(default)]
    pub bls_signature_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMap3NodeParameters {
    pub amount: Option<Amount>,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,
    #[serde(default)]
    pub description: Description,
    #[serde(default = "default_bls_key_count")]
    pub bls_key_count: usize,
    #[serde(default)]
    pub bls_signature_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewParameters {
    #[serde(default)]
    pub operator_send_renew: bool,
    /// Epoch to wait for before the operator renew, 0 for none
    #[serde(default)]
    pub operator_wait_epoch: u64,
    #[serde(default)]
    pub participant_send_renew: bool,
    #[serde(default)]
    pub participant_wait_epoch: u64,
    /// Whether the renew transactions opt in or out of the next round
    #[serde(default = "default_renew")]
    pub renew: bool,
    /// Sent with the operator renew only
    #[serde(default)]
    pub new_commission_rate: Option<Decimal>,
}

impl Default for RenewParameters {
    fn default() -> Self {
        Self {
            operator_send_renew: false,
            operator_wait_epoch: 0,
            participant_send_renew: false,
            participant_wait_epoch: 0,
            renew: default_renew(),
            new_commission_rate: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationParameters {
    pub amount: Option<Amount>,
    #[serde(default)]
    pub renew: RenewParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndelegationParameters {
    pub amount: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditParameters {
    /// Number of edit transactions; 0 sends none
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    #[serde(default)]
    pub mode: EditMode,
    #[serde(default)]
    pub description: Option<Description>,
    #[serde(default)]
    pub commission_rate: Option<Decimal>,
    #[serde(default)]
    pub max_total_delegation: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateParameters {
    /// Epoch to wait for before terminating, 0 for none
    #[serde(default)]
    pub wait_epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParameters {
    #[serde(default)]
    pub gas: GasParams,
    /// Negative values query the nonce from the chain
    #[serde(default = "default_nonce")]
    pub nonce: i64,
    /// Seconds a staking transaction may take to be included
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub shard: u32,
    #[serde(default)]
    pub reuse_existing_validator: bool,
    #[serde(default)]
    pub mode: ScenarioMode,

    #[serde(default)]
    pub create_validator: Option<CreateValidatorParameters>,
    #[serde(default)]
    pub create_map3_node: Option<CreateMap3NodeParameters>,
    #[serde(default)]
    pub delegation: Option<DelegationParameters>,
    #[serde(default)]
    pub undelegation: Option<UndelegationParameters>,
    #[serde(default)]
    pub edit: Option<EditParameters>,
    #[serde(default)]
    pub terminate: Option<TerminateParameters>,
}

impl Default for StakingParameters {
    fn default() -> Self {
        Self {
            gas: GasParams::default(),
            nonce: default_nonce(),
            timeout: default_timeout(),
            shard: 0,
            reuse_existing_validator: false,
            mode: ScenarioMode::default(),
            create_validator: None,
            create_map3_node: None,
            delegation: None,
            undelegation: None,
            edit: None,
            terminate: None,
        }
    }
}

fn require<'a, T>(section: &'a Option<T>, name: &str) -> Result<&'a T, ParameterError> {
    section
        .as_ref()
        .ok_or_else(|| ParameterError::MissingSection(name.to_owned()))
}

fn check_amount(amount: Option<Amount>, name: &str) -> Result<Amount, ParameterError> {
    let amount = amount.ok_or_else(|| ParameterError::NilAmount(name.to_owned()))?;
    if amount.is_negative() {
        return Err(ParameterError::NegativeAmount(name.to_owned()));
    }
    Ok(amount)
}

fn check_description(description: &Description) -> Result<(), ParameterError> {
    description
        .validate()
        .map_err(|err| PayloadError::from(err).into())
}

impl StakingParameters {
    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            gas: self.gas,
            nonce: NonceSelection::from_config(self.nonce),
            timeout: Duration::from_secs(self.timeout),
            shard: self.shard,
        }
    }

    pub fn create_validator(&self) -> Result<&CreateValidatorParameters, ParameterError> {
        require(&self.create_validator, "create_validator")
    }

    pub fn create_map3_node(&self) -> Result<&CreateMap3NodeParameters, ParameterError> {
        require(&self.create_map3_node, "create_map3_node")
    }

    pub fn delegation(&self) -> Result<&DelegationParameters, ParameterError> {
        require(&self.delegation, "delegation")
    }

    pub fn undelegation(&self) -> Result<&UndelegationParameters, ParameterError> {
        require(&self.undelegation, "undelegation")
    }

    pub fn edit(&self) -> Result<&EditParameters, ParameterError> {
        require(&self.edit, "edit")
    }

    /// Terminate gates are optional, a missing section means no wait
    pub fn terminate(&self) -> TerminateParameters {
        self.terminate.clone().unwrap_or_default()
    }

    /// Checks everything `kind` will read and returns what it has to draw
    /// from the funding account.
    pub fn validate(
        &self,
        kind: ScenarioKind,
        shard_count: u32,
    ) -> Result<FundingDetails, ParameterError> {
        if self.mode == ScenarioMode::RepeatRenew && kind != ScenarioKind::Renew {
            return Err(ParameterError::UnsupportedMode {
                mode: self.mode.to_string(),
                scenario: kind.to_string(),
            });
        }

        let required = match kind {
            ScenarioKind::CreateValidator => self.validate_validator()?,
            ScenarioKind::CreateMap3Node => self.validate_map3_node()?,
            ScenarioKind::Delegate => sum_amounts(&[
                Some(self.validate_validator()?),
                Some(self.validate_map3_node()?),
            ])
            .ok_or(ParameterError::FundingOverflow)?,
            ScenarioKind::Undelegate => {
                let delegation = self.validate_delegation()?;
                let undelegation = check_amount(self.undelegation()?.amount, "undelegation")?;
                if undelegation > delegation {
                    return Err(ParameterError::Payload(format!(
                        "undelegation amount {} exceeds delegation amount {}",
                        undelegation, delegation
                    )));
                }
                self.map3_plus(delegation)?
            }
            ScenarioKind::Renew => {
                let delegation = self.validate_delegation()?;
                if let Some(rate) = &self.delegation()?.renew.new_commission_rate {
                    validate_commission_rate(rate)?;
                }
                self.map3_plus(delegation)?
            }
            ScenarioKind::EditValidator => {
                let edit = self.edit()?;
                if let Some(description) = &edit.description {
                    check_description(description)?;
                }
                if let Some(rate) = &edit.commission_rate {
                    validate_commission_rate(rate)?;
                }
                if let Some(max) = edit.max_total_delegation {
                    check_amount(Some(max), "max_total_delegation")?;
                }
                self.validate_validator()?
            }
            ScenarioKind::Terminate | ScenarioKind::TerminateInvalidAddress => {
                let delegation = self.validate_delegation()?;
                self.map3_plus(delegation)?
            }
        };

        calculate_funding_details(Some(required), 1, shard_count)
    }

    fn validate_validator(&self) -> Result<Amount, ParameterError> {
        let section = self.create_validator()?;
        let amount = check_amount(section.amount, "create_validator")?;
        validate_commission_rate(&section.commission_rate)?;
        check_description(&section.description)?;
        if let Some(max) = section.max_total_delegation {
            check_amount(Some(max), "max_total_delegation")?;
        }
        if section.bls_key_count == 0 {
            return Err(ParameterError::NoBlsKeys {
                section: "create_validator".into(),
            });
        }
        Ok(amount)
    }

    fn validate_map3_node(&self) -> Result<Amount, ParameterError> {
        let section = self.create_map3_node()?;
        let amount = check_amount(section.amount, "create_map3_node")?;
        validate_commission_rate(&section.commission_rate)?;
        check_description(&section.description)?;
        if section.bls_key_count == 0 {
            return Err(ParameterError::NoBlsKeys {
                section: "create_map3_node".into(),
            });
        }
        Ok(amount)
    }

    fn validate_delegation(&self) -> Result<Amount, ParameterError> {
        check_amount(self.delegation()?.amount, "delegation")
    }

    // Map3 node stake plus the delegation on top of it
    fn map3_plus(&self, delegation: Amount) -> Result<Amount, ParameterError> {
        let map3 = self.validate_map3_node()?;
        sum_amounts(&[Some(map3), Some(delegation)]).ok_or(ParameterError::FundingOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map3_section(amount: Option<Amount>) -> CreateMap3NodeParameters {
        CreateMap3NodeParameters {
            amount,
            commission_rate: "0.1".parse().unwrap(),
            description: Description::default(),
            bls_key_count: 1,
            bls_signature_message: String::new(),
        }
    }

    fn delegation_section(amount: Option<Amount>) -> DelegationParameters {
        DelegationParameters {
            amount,
            renew: RenewParameters::default(),
        }
    }

    #[test]
    fn test_defaults_from_yaml() {
        let params: StakingParameters = serde_yaml::from_str(
            r#"
create_map3_node:
  amount: "1000"
"#,
        )
        .unwrap();
        assert_eq!(params.nonce, -1);
        assert_eq!(params.timeout, 60);
        assert_eq!(params.mode, ScenarioMode::Standard);
        let section = params.create_map3_node().unwrap();
        assert_eq!(section.bls_key_count, 1);
        assert_eq!(section.commission_rate, Decimal::zero());
        assert_eq!(params.submit_options().nonce, NonceSelection::Auto);
    }

    #[test]
    fn test_missing_section_fails() {
        let params = StakingParameters::default();
        assert_eq!(
            params.validate(ScenarioKind::CreateMap3Node, 1),
            Err(ParameterError::MissingSection("create_map3_node".into()))
        );
    }

    #[test]
    fn test_nil_and_negative_amounts_fail() {
        let mut params = StakingParameters {
            create_map3_node: Some(map3_section(None)),
            ..Default::default()
        };
        assert_eq!(
            params.validate(ScenarioKind::CreateMap3Node, 1),
            Err(ParameterError::NilAmount("create_map3_node".into()))
        );

        params.create_map3_node = Some(map3_section(Some(Amount::from_coins(-5))));
        assert_eq!(
            params.validate(ScenarioKind::CreateMap3Node, 1),
            Err(ParameterError::NegativeAmount("create_map3_node".into()))
        );
    }

    #[test]
    fn test_funding_covers_map3_and_delegation() {
        let params = StakingParameters {
            create_map3_node: Some(map3_section(Some(Amount::from_coins(100)))),
            delegation: Some(delegation_section(Some(Amount::from_coins(20)))),
            ..Default::default()
        };
        let details = params.validate(ScenarioKind::Renew, 2).unwrap();
        assert_eq!(details.funding_amount, Amount::from_coins(120));
        assert_eq!(details.per_shard_amount, Amount::from_coins(60));
    }

    #[test]
    fn test_repeat_renew_only_for_renew() {
        let params = StakingParameters {
            mode: ScenarioMode::RepeatRenew,
            create_map3_node: Some(map3_section(Some(Amount::from_coins(100)))),
            delegation: Some(delegation_section(Some(Amount::from_coins(20)))),
            ..Default::default()
        };
        assert!(params.validate(ScenarioKind::Renew, 1).is_ok());
        assert_eq!(
            params.validate(ScenarioKind::Terminate, 1),
            Err(ParameterError::UnsupportedMode {
                mode: "repeat_renew".into(),
                scenario: "terminate".into(),
            })
        );
    }

    #[test]
    fn test_invalid_commission_rate_fails() {
        let mut section = map3_section(Some(Amount::from_coins(100)));
        section.commission_rate = "1.5".parse().unwrap();
        let params = StakingParameters {
            create_map3_node: Some(section),
            ..Default::default()
        };
        assert!(matches!(
            params.validate(ScenarioKind::CreateMap3Node, 1),
            Err(ParameterError::Payload(_))
        ));
    }

    #[test]
    fn test_undelegating_more_than_delegated_fails() {
        let params = StakingParameters {
            create_map3_node: Some(map3_section(Some(Amount::from_coins(100)))),
            delegation: Some(delegation_section(Some(Amount::from_coins(20)))),
            undelegation: Some(UndelegationParameters {
                amount: Some(Amount::from_coins(21)),
            }),
            ..Default::default()
        };
        assert!(params.validate(ScenarioKind::Undelegate, 1).is_err());
    }

    #[test]
    fn test_edit_with_zero_repeat_is_valid() {
        let params: StakingParameters = serde_yaml::from_str(
            r#"
create_validator:
  amount: "10000"
  commission_rate: 0.1
edit:
  repeat: 0
  mode: rotate_bls_key
"#,
        )
        .unwrap();
        assert!(params.validate(ScenarioKind::EditValidator, 1).is_ok());
        assert_eq!(params.edit().unwrap().repeat, 0);
    }
}
