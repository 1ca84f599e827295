use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    configuration_store::ConfigurationStore,
    flags::{self, eval_details::EvaluationDetails, Evaluation, Reason},
    Configuration, EvaluationContext, EvaluationError, Str,
};

pub struct EvaluatorConfig {
    pub configuration_store: Arc<ConfigurationStore>,
}

/// Evaluator simplifies calling into evaluation functions: it reads the current configuration
/// snapshot from the store and looks the flag up.
pub struct Evaluator {
    config: EvaluatorConfig,
}

/// Result of evaluating a single flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEvaluation {
    pub flag_key: Str,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

/// Results of evaluating every flag of a configuration for one context.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvaluation {
    pub results: HashMap<Str, Evaluation>,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Evaluator {
        Evaluator { config }
    }

    /// Evaluate a flag for `context`.
    ///
    /// Errors are returned only when there is no flag to evaluate: configuration is missing, the
    /// flag does not exist, or it failed to parse. Misconfigured flags are evaluated and report
    /// [`Reason::Error`].
    pub fn evaluate_flag(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<FlagEvaluation, EvaluationError> {
        let configuration = self.get_configuration();
        evaluate_flag(configuration.as_deref(), flag_key, context)
    }

    /// Evaluate a flag for `context` and return evaluation details along with the result.
    pub fn evaluate_flag_details(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<(FlagEvaluation, EvaluationDetails), EvaluationError> {
        let configuration = self.get_configuration();
        evaluate_flag_details(configuration.as_deref(), flag_key, context, Utc::now())
    }

    /// Evaluate all flags for `context`.
    ///
    /// Returns an empty batch if configuration is missing.
    pub fn evaluate_all(&self, context: &EvaluationContext) -> BatchEvaluation {
        let configuration = self.get_configuration();
        evaluate_all(configuration.as_deref(), context)
    }

    fn get_configuration(&self) -> Option<Arc<Configuration>> {
        self.config.configuration_store.get_configuration()
    }
}

fn get_flag<'a>(
    configuration: Option<&'a Configuration>,
    flag_key: &str,
    context: &EvaluationContext,
) -> Result<(&'a Configuration, &'a flags::Flag), EvaluationError> {
    let Some(configuration) = configuration else {
        log::warn!(target: "flag_core",
                   flag_key,
                   context_key:display = context.key();
                   "evaluating a flag before configuration has been set");
        return Err(EvaluationError::ConfigurationMissing);
    };

    match configuration.get_flag(flag_key) {
        Ok(flag) => Ok((configuration, flag)),
        Err(err) => {
            log::warn!(target: "flag_core",
                       flag_key,
                       context_key:display = context.key();
                       "cannot evaluate flag: {err}");
            Err(err)
        }
    }
}

/// Evaluate the specified flag for `context` against `configuration`.
pub fn evaluate_flag(
    configuration: Option<&Configuration>,
    flag_key: &str,
    context: &EvaluationContext,
) -> Result<FlagEvaluation, EvaluationError> {
    let (configuration, flag) = get_flag(configuration, flag_key, context)?;
    Ok(FlagEvaluation {
        flag_key: flag_key.into(),
        evaluation: flags::evaluate(flag, context, configuration.segments()),
    })
}

/// Evaluate the specified flag for `context` against `configuration` and return evaluation
/// details.
pub fn evaluate_flag_details(
    configuration: Option<&Configuration>,
    flag_key: &str,
    context: &EvaluationContext,
    now: DateTime<Utc>,
) -> Result<(FlagEvaluation, EvaluationDetails), EvaluationError> {
    let (configuration, flag) = get_flag(configuration, flag_key, context)?;
    let (evaluation, details) =
        flags::evaluate_details(flag, context, configuration.segments(), now);
    Ok((
        FlagEvaluation {
            flag_key: flag_key.into(),
            evaluation,
        },
        details,
    ))
}

/// Evaluate every flag of `configuration` for `context`. Flags that failed to parse are reported
/// with a `null` value and [`Reason::Error`].
pub fn evaluate_all(
    configuration: Option<&Configuration>,
    context: &EvaluationContext,
) -> BatchEvaluation {
    let Some(configuration) = configuration else {
        log::warn!(target: "flag_core",
                   context_key:display = context.key();
                   "evaluating flags before configuration has been set");
        return BatchEvaluation::default();
    };

    let results = configuration
        .flags()
        .map(|(flag_key, flag)| {
            let evaluation = match flag {
                Ok(flag) => flags::evaluate(flag, context, configuration.segments()),
                Err(err) => Evaluation {
                    value: None,
                    variation_index: None,
                    reason: Reason::Error { error_kind: *err },
                },
            };
            (flag_key.clone(), evaluation)
        })
        .collect();

    BatchEvaluation { results }
}
