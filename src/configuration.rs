use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::{
    flags::{
        compile_flag, compile_segment, ConfigurationWire, Environment, Flag, Segment, SegmentIndex,
        SegmentWire, Segments, TryParse,
    },
    EvaluationError, Result, Str,
};

/// Flag configuration of one environment, compiled and ready for evaluation. It is immutable and
/// can only be replaced completely.
#[derive(Debug)]
pub struct Configuration {
    /// Timestamp when configuration was loaded.
    pub fetched_at: DateTime<Utc>,
    /// Timestamp when configuration was published, if known.
    pub published_at: Option<DateTime<Utc>>,
    pub environment: Environment,
    /// Flags by key. `Err` holds flags that failed to parse.
    flags: HashMap<Str, std::result::Result<Flag, EvaluationError>>,
    segments: Segments,
}

impl Configuration {
    /// Parse configuration from its JSON wire format.
    ///
    /// Fails only if the document as a whole is malformed. Flags that fail to parse are kept and
    /// evaluate to [`EvaluationError::ConfigurationParseError`]; segments that fail to parse are
    /// dropped.
    pub fn from_json(json: &[u8]) -> Result<Configuration> {
        let config: ConfigurationWire = serde_json::from_slice(json).map_err(|err| {
            log::warn!(target: "flag_core", "failed to parse configuration: {err}");
            err
        })?;
        Ok(Configuration::from_wire(config))
    }

    /// Compile configuration from the wire format, resolving segment references by id to segment
    /// keys.
    pub fn from_wire(config: ConfigurationWire) -> Configuration {
        let segments: Vec<SegmentWire> = config
            .segments
            .into_iter()
            .filter_map(|(segment_key, segment)| match segment {
                TryParse::Parsed(segment) => Some(segment),
                TryParse::ParseFailed(_) => {
                    log::warn!(target: "flag_core",
                               segment_key:display = segment_key;
                               "failed to parse segment, references to it will not match");
                    None
                }
            })
            .collect();
        let index = SegmentIndex::new(&segments);

        let flags = config
            .flags
            .into_iter()
            .map(|(flag_key, flag)| match flag {
                // The flag's own key salts its rollouts, so it is also the lookup key.
                TryParse::Parsed(flag) => {
                    if flag.key != flag_key {
                        log::warn!(target: "flag_core",
                                   flag_key:display = flag_key,
                                   key:display = flag.key;
                                   "flag is listed under a different key, using its own key");
                    }
                    (flag.key.clone(), Ok(compile_flag(flag, &index)))
                }
                TryParse::ParseFailed(_) => {
                    log::warn!(target: "flag_core",
                               flag_key:display = flag_key;
                               "failed to parse flag configuration");
                    (flag_key, Err(EvaluationError::ConfigurationParseError))
                }
            })
            .collect();

        let segments = segments
            .into_iter()
            .map(|segment| (segment.key.clone(), compile_segment(segment, &index)))
            .collect();

        Configuration {
            fetched_at: Utc::now(),
            published_at: config.created_at,
            environment: config.environment,
            flags,
            segments,
        }
    }

    /// Build configuration from flags and segments that are already in the evaluation model.
    pub fn new(
        environment: Environment,
        flags: impl IntoIterator<Item = Flag>,
        segments: impl IntoIterator<Item = Segment>,
    ) -> Configuration {
        Configuration {
            fetched_at: Utc::now(),
            published_at: None,
            environment,
            flags: flags
                .into_iter()
                .map(|flag| (flag.key.clone(), Ok(flag)))
                .collect(),
            segments: segments
                .into_iter()
                .map(|segment| (segment.key.clone(), segment))
                .collect(),
        }
    }

    /// Look up a flag.
    ///
    /// Fails with [`EvaluationError::FlagNotFound`] or
    /// [`EvaluationError::ConfigurationParseError`].
    pub fn get_flag(&self, flag_key: &str) -> std::result::Result<&Flag, EvaluationError> {
        match self.flags.get(flag_key) {
            Some(Ok(flag)) => Ok(flag),
            Some(Err(err)) => Err(*err),
            None => Err(EvaluationError::FlagNotFound),
        }
    }

    /// Segments visible to flags of this configuration.
    pub fn segments(&self) -> &Segments {
        &self.segments
    }

    /// Get a set of all available flags. Note that this may return both disabled flags and flags
    /// with bad configuration.
    pub fn flag_keys(&self) -> HashSet<Str> {
        self.flags.keys().cloned().collect()
    }

    pub(crate) fn flags(
        &self,
    ) -> impl Iterator<Item = (&Str, &std::result::Result<Flag, EvaluationError>)> {
        self.flags.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Configuration;
    use crate::{
        flags::{ClauseTarget, Environment, Flag, FlagWire},
        Error, EvaluationContext, EvaluationError, Str,
    };

    fn config_json() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "createdAt": "2024-07-18T00:00:00Z",
            "environment": {"name": "production", "project": "storefront"},
            "flags": {
                "beta-banner": {
                    "key": "beta-banner",
                    "enabled": true,
                    "variations": [{"value": false}, {"value": true}],
                    "offVariationIndex": 0,
                    "rules": [{
                        "clauses": [{"attribute": "segment:seg_1", "operator": "isTrue"}],
                        "variationIndex": 1
                    }],
                    "defaultOutcome": {"variationIndex": 0}
                },
                "broken": {
                    "key": "broken",
                    "enabled": "maybe"
                }
            },
            "segments": {
                "beta": {"key": "beta", "id": "seg_1", "included": ["u1"]},
                "corrupt": {"key": "corrupt", "included": "u1"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_environment() {
        let config = Configuration::from_json(&config_json()).unwrap();
        assert_eq!(config.environment.name.to_string(), "production");
        assert_eq!(
            config.published_at.map(|it| it.to_rfc3339()),
            Some("2024-07-18T00:00:00+00:00".to_owned())
        );
        assert_eq!(config.flag_keys().len(), 2);
    }

    #[test]
    fn resolves_segment_ids() {
        let config = Configuration::from_json(&config_json()).unwrap();
        let flag = config.get_flag("beta-banner").unwrap();
        assert_eq!(
            flag.rules[0].clauses[0].target,
            ClauseTarget::Segment("beta".into())
        );
        assert!(config.segments()["beta"].is_member(&EvaluationContext::from_key("u1")));
    }

    #[test]
    fn keeps_unparseable_flags_as_errors() {
        let config = Configuration::from_json(&config_json()).unwrap();
        assert_eq!(
            config.get_flag("broken").unwrap_err(),
            EvaluationError::ConfigurationParseError
        );
        assert_eq!(
            config.get_flag("missing").unwrap_err(),
            EvaluationError::FlagNotFound
        );
    }

    #[test]
    fn drops_unparseable_segments() {
        let config = Configuration::from_json(&config_json()).unwrap();
        assert!(config.segments().get("corrupt").is_none());
        assert_eq!(config.segments().len(), 1);
    }

    #[test]
    fn flags_are_keyed_by_their_own_key() {
        let json = serde_json::to_vec(&json!({
            "environment": {"name": "test"},
            "flags": {
                "listed-as": {
                    "key": "checkout",
                    "enabled": true,
                    "variations": [{"value": "on"}],
                    "offVariationIndex": 0,
                    "defaultOutcome": {"variationIndex": 0}
                }
            }
        }))
        .unwrap();
        let config = Configuration::from_json(&json).unwrap();

        assert_eq!(&*config.get_flag("checkout").unwrap().key, "checkout");
        assert_eq!(
            config.get_flag("listed-as").unwrap_err(),
            EvaluationError::FlagNotFound
        );
        assert_eq!(
            config.flag_keys().into_iter().collect::<Vec<_>>(),
            vec![Str::from("checkout")]
        );
    }

    #[test]
    fn rejects_malformed_document() {
        let result = Configuration::from_json(b"{\"flags\": 42}");
        assert!(matches!(result, Err(Error::ConfigurationParseError(_))));
    }

    #[test]
    fn from_flags() {
        let flag: FlagWire = serde_json::from_value(json!({
            "key": "checkout",
            "enabled": true,
            "variations": [{"value": "on"}],
            "offVariationIndex": 0,
            "defaultOutcome": {"variationIndex": 0}
        }))
        .unwrap();
        let config = Configuration::new(
            Environment {
                name: "test".into(),
                project: None,
            },
            [Flag::from(flag)],
            [],
        );
        assert!(config.get_flag("checkout").is_ok());
        assert!(config.segments().is_empty());
    }
}
