use std::{collections::HashMap, sync::Arc};

use miette::{miette, Context, IntoDiagnostic, Result};
use streamchain_config::{ChainConfig, ChainTemplate, ConfiguredFilter, FilterRole};

use crate::{
    filter::AccessLog,
    manager::StreamFilterManager,
    phase::PhasedSenderFilter,
    registry::{FilterInstance, FilterRegistry},
    types::FilterPhase,
};

/// Builds a populated [`StreamFilterManager`] for every new stream of a chain.
///
/// Receiver and sender filters are built fresh per stream since they may keep
/// per-stream state. Access loggers are built once and shared.
#[derive(Clone)]
pub struct ChainFactory {
    template: ChainTemplate,
    registry: Arc<FilterRegistry>,
    access_logs: Vec<Arc<dyn AccessLog>>,
}

impl ChainFactory {
    pub fn new(template: ChainTemplate, registry: Arc<FilterRegistry>) -> Result<Self> {
        for filter in &template.filters {
            if !registry.contains(&filter.name) {
                return Err(miette!(
                    "Chain '{}' references unknown filter '{}'. Did you forget to register it?",
                    template.name,
                    filter.name
                ));
            }
        }

        let mut factory = Self {
            template,
            registry,
            access_logs: vec![],
        };

        for filter in factory.template.filters_with_role(FilterRole::AccessLog) {
            match factory.build(filter)? {
                FilterInstance::AccessLog(log) => factory.access_logs.push(log),
                other => return Err(factory.role_mismatch(filter, &other)),
            }
        }

        Ok(factory)
    }

    /// One factory per chain of the document
    pub fn build_all(
        config: &ChainConfig,
        registry: Arc<FilterRegistry>,
    ) -> Result<HashMap<String, ChainFactory>> {
        config
            .chains
            .iter()
            .map(|template| {
                let factory = ChainFactory::new(template.clone(), registry.clone())?;
                Ok((template.name.clone(), factory))
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn template(&self) -> &ChainTemplate {
        &self.template
    }

    pub fn create_manager(&self) -> Result<StreamFilterManager> {
        let mut manager = StreamFilterManager::new();

        for filter in &self.template.filters {
            if filter.role == FilterRole::AccessLog {
                continue;
            }

            let phase = filter.phase.map(FilterPhase).unwrap_or(FilterPhase::UNDEFINED);

            match (filter.role, self.build(filter)?) {
                (FilterRole::Receiver, FilterInstance::Receiver(f)) => {
                    manager.add_receiver_filter(f, phase);
                }
                (FilterRole::Sender, FilterInstance::Sender(f)) => match filter.phase {
                    Some(_) => manager
                        .add_sender_filter_with_phase(Box::new(PhasedSenderFilter::new(f, phase))),
                    None => manager.add_sender_filter(f),
                },
                (_, other) => return Err(self.role_mismatch(filter, &other)),
            }
        }

        for log in &self.access_logs {
            manager.add_access_log(log.clone());
        }

        tracing::trace!(
            "Chain '{}' built {} receiver and {} sender filters",
            self.template.name,
            manager.receiver_filter_count(),
            manager.sender_filter_count()
        );

        Ok(manager)
    }

    fn build(&self, filter: &ConfiguredFilter) -> Result<FilterInstance> {
        self.registry
            .build(&filter.name, filter.args.clone())
            .into_diagnostic()
            .wrap_err_with(|| {
                format!(
                    "Failed to build filter '{}' in chain '{}'",
                    filter.name, self.template.name
                )
            })
    }

    fn role_mismatch(&self, filter: &ConfiguredFilter, built: &FilterInstance) -> miette::Report {
        miette!(
            "Filter '{}' in chain '{}' is configured as {} but its factory builds a {} filter",
            filter.name,
            self.template.name,
            filter.role,
            built.role()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;
    use bytes::BytesMut;
    use http::{HeaderMap, HeaderValue};

    use super::*;
    use crate::{
        filter::{StreamReceiverFilter, StreamSenderFilter},
        registry::FilterBuildError,
        settings::SettingsExt,
        types::{FilterStatus, RequestInfo, StreamContext},
    };

    /// Stamps its value on the headers and counts its own invocations
    struct Stamp {
        value: HeaderValue,
        calls: usize,
    }

    impl Stamp {
        fn from_settings(mut settings: BTreeMap<String, String>) -> Result<Self, FilterBuildError> {
            let value = settings.take_required("value")?;
            settings.ensure_empty()?;
            let value = HeaderValue::from_str(&value).map_err(|e| FilterBuildError::InvalidSetting {
                key: "value".to_string(),
                reason: e.to_string(),
            })?;
            Ok(Self { value, calls: 0 })
        }

        fn stamp(&mut self, headers: &mut HeaderMap) -> FilterStatus {
            self.calls += 1;
            headers.append("x-stamp", self.value.clone());
            headers.insert("x-calls", HeaderValue::from(self.calls));
            FilterStatus::Continue
        }
    }

    #[async_trait]
    impl StreamReceiverFilter for Stamp {
        async fn on_receive(
            &mut self,
            _ctx: &StreamContext,
            headers: &mut HeaderMap,
            _body: Option<&mut BytesMut>,
            _trailers: Option<&mut HeaderMap>,
        ) -> FilterStatus {
            self.stamp(headers)
        }
    }

    #[async_trait]
    impl StreamSenderFilter for Stamp {
        async fn append(
            &mut self,
            _ctx: &StreamContext,
            headers: &mut HeaderMap,
            _body: Option<&mut BytesMut>,
            _trailers: Option<&mut HeaderMap>,
        ) -> FilterStatus {
            self.stamp(headers)
        }
    }

    struct CountingLog(AtomicUsize);

    impl AccessLog for CountingLog {
        fn log(
            &self,
            _ctx: &StreamContext,
            _request_headers: Option<&HeaderMap>,
            _response_headers: Option<&HeaderMap>,
            _request_info: &RequestInfo,
        ) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup_registry(log: Arc<CountingLog>, log_builds: Arc<Mutex<usize>>) -> FilterRegistry {
        let mut reg = FilterRegistry::new();

        reg.register_factory(
            fqdn::fqdn!("test.stamp.request"),
            Box::new(|s: BTreeMap<String, String>| -> Result<FilterInstance, FilterBuildError> {
                Ok(FilterInstance::Receiver(Box::new(Stamp::from_settings(s)?)))
            }),
        );

        reg.register_factory(
            fqdn::fqdn!("test.stamp.response"),
            Box::new(|s: BTreeMap<String, String>| -> Result<FilterInstance, FilterBuildError> {
                Ok(FilterInstance::Sender(Box::new(Stamp::from_settings(s)?)))
            }),
        );

        reg.register_factory(
            fqdn::fqdn!("test.log.count"),
            Box::new(
                move |_: BTreeMap<String, String>| -> Result<FilterInstance, FilterBuildError> {
                    *log_builds.lock().unwrap() += 1;
                    Ok(FilterInstance::AccessLog(log.clone()))
                },
            ),
        );

        reg
    }

    fn template(kdl: &str) -> ChainTemplate {
        let config = streamchain_config::parse_str("test.kdl", kdl).unwrap();
        config.chains.into_iter().next().unwrap()
    }

    fn registry() -> (Arc<FilterRegistry>, Arc<CountingLog>, Arc<Mutex<usize>>) {
        let log = Arc::new(CountingLog(AtomicUsize::new(0)));
        let builds = Arc::new(Mutex::new(0));
        (
            Arc::new(setup_registry(log.clone(), builds.clone())),
            log,
            builds,
        )
    }

    #[tokio::test]
    async fn test_create_manager_follows_template() {
        let (registry, log, log_builds) = registry();
        let factory = ChainFactory::new(
            template(
                r#"
                chain "edge" {
                    receiver "test.stamp.request" phase=1 value="one"
                    sender "test.stamp.response" value="s"
                    receiver "test.stamp.request" phase=2 value="two"
                    receiver "test.stamp.request" phase=1 value="three"
                    access-log "test.log.count"
                }
                "#,
            ),
            registry,
        )
        .unwrap();

        let mut manager = factory.create_manager().unwrap();
        assert_eq!(factory.name(), "edge");
        assert_eq!(manager.receiver_filter_count(), 3);
        assert_eq!(manager.sender_filter_count(), 1);
        assert_eq!(manager.access_log_count(), 1);

        let ctx = StreamContext::new();
        let mut headers = HeaderMap::new();
        manager
            .run_receiver_filters(&ctx, FilterPhase(1), &mut headers, None, None, None)
            .await;

        let stamps: Vec<_> = headers.get_all("x-stamp").iter().collect();
        assert_eq!(stamps, ["one", "three"]);

        manager.log(&ctx, Some(&headers), None, &RequestInfo::default());
        assert_eq!(log.0.load(Ordering::SeqCst), 1);
        assert_eq!(*log_builds.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_each_stream_gets_fresh_filters() {
        let (registry, log, log_builds) = registry();
        let factory = ChainFactory::new(
            template(
                r#"
                chain "edge" {
                    sender "test.stamp.response" phase=4 value="s"
                    access-log "test.log.count"
                }
                "#,
            ),
            registry,
        )
        .unwrap();

        let ctx = StreamContext::new();
        for _ in 0..3 {
            let mut manager = factory.create_manager().unwrap();
            let mut headers = HeaderMap::new();
            manager
                .run_sender_filters(&ctx, FilterPhase(9), &mut headers, None, None, None)
                .await;

            assert_eq!(headers.get("x-calls").unwrap(), "1");
            manager.log(&ctx, None, Some(&headers), &RequestInfo::default());
        }

        assert_eq!(log.0.load(Ordering::SeqCst), 3);
        assert_eq!(*log_builds.lock().unwrap(), 1);
    }

    #[test]
    fn test_unknown_filter_is_rejected() {
        let (registry, _, _) = registry();
        let result = ChainFactory::new(
            template(
                r#"
                chain "edge" {
                    receiver "test.stamp.missing" phase=1
                }
                "#,
            ),
            registry,
        );

        let err = result.err().unwrap();
        assert!(err
            .to_string()
            .contains("Chain 'edge' references unknown filter 'test.stamp.missing'"));
    }

    #[test]
    fn test_role_mismatch_is_rejected() {
        let (registry, _, _) = registry();
        let factory = ChainFactory::new(
            template(
                r#"
                chain "edge" {
                    sender "test.stamp.request" value="x"
                }
                "#,
            ),
            registry,
        )
        .unwrap();

        let err = factory.create_manager().err().unwrap();
        assert!(err
            .to_string()
            .contains("is configured as sender but its factory builds a receiver filter"));
    }

    #[test]
    fn test_filter_build_errors_carry_context() {
        let (registry, _, _) = registry();
        let factory = ChainFactory::new(
            template(
                r#"
                chain "edge" {
                    receiver "test.stamp.request" phase=1
                }
                "#,
            ),
            registry,
        )
        .unwrap();

        let err = factory.create_manager().err().unwrap();
        assert!(err
            .to_string()
            .contains("Failed to build filter 'test.stamp.request' in chain 'edge'"));
        assert!(err
            .chain()
            .any(|cause| cause.to_string() == "Missing configuration field 'value'"));
    }

    #[test]
    fn test_build_all() {
        let (registry, _, _) = registry();
        let config = streamchain_config::parse_str(
            "test.kdl",
            r#"
            chain "a" {
                receiver "test.stamp.request" phase=1 value="a"
            }
            chain "b" {
                access-log "test.log.count"
            }
            "#,
        )
        .unwrap();

        let factories = ChainFactory::build_all(&config, registry).unwrap();
        assert_eq!(factories.len(), 2);
        assert_eq!(factories["a"].template().filters.len(), 1);
        assert_eq!(factories["b"].create_manager().unwrap().access_log_count(), 1);
    }
}
