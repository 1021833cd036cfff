//! Retro HTML Filter for Envoy Proxy
//!
//! This filter rewrites HTML response bodies for vintage terminals. Every
//! body chunk is streamed through a tag/attribute filter that strips
//! disallowed markup, collapses whitespace and optionally remaps the result
//! to the terminal's internal character encoding. Bodies are never
//! buffered whole.
//!
//! Targets: wasm32-wasi (Envoy proxy-wasm ABI)

pub mod config;
pub mod html;
pub mod streaming;
pub mod telemetry;

use log::{debug, info, warn};
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, ContextType, LogLevel};
use std::cell::RefCell;
use std::sync::Arc;

use crate::config::PluginConfig;
use crate::html::{FilterRules, StreamingBodyFilter};

/// Configuration shared by every HTTP context of one root context
#[derive(Clone, Debug, Default)]
struct SharedConfig {
    config: PluginConfig,
    rules: Arc<FilterRules>,
}

impl SharedConfig {
    fn new(config: PluginConfig) -> Self {
        let mut rules = FilterRules::default();
        rules.set_filter(&config.html_filter);
        Self {
            config,
            rules: Arc::new(rules),
        }
    }

    /// Whether running the engine changes anything at all
    fn is_engaged(&self) -> bool {
        self.rules.is_active()
    }
}

// Thread-local storage for filter configuration
thread_local! {
    static CONFIG: RefCell<SharedConfig> = RefCell::new(SharedConfig::default());
}

/// Root context for filter lifecycle management
struct HtmlFilterRootContext {
    shared: SharedConfig,
}

impl HtmlFilterRootContext {
    fn new() -> Self {
        Self {
            shared: SharedConfig::default(),
        }
    }
}

impl Context for HtmlFilterRootContext {}

impl RootContext for HtmlFilterRootContext {
    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        if let Some(config_bytes) = self.get_plugin_configuration() {
            match PluginConfig::from_bytes(&config_bytes) {
                Ok(config) => {
                    info!("Loading HTML filter configuration: {}", config.html_filter);
                    self.shared = SharedConfig::new(config);
                }
                Err(e) => {
                    // Fail open: keep the previous configuration
                    telemetry::audit_config_rejected(&e.to_string()).emit();
                }
            }
        }

        CONFIG.with(|c| {
            *c.borrow_mut() = self.shared.clone();
        });

        telemetry::audit_configured(
            self.shared.rules.filter_count(),
            self.shared.rules.converts_to_internal_encoding(),
        )
        .emit();

        true
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        Some(Box::new(HtmlFilterHttpContext::new(context_id)))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

/// HTTP context for per-response processing
struct HtmlFilterHttpContext {
    context_id: u32,
    /// Configuration snapshot for this response
    shared: SharedConfig,
    /// Present once the response was found to be filterable
    body_filter: Option<StreamingBodyFilter>,
}

impl HtmlFilterHttpContext {
    fn new(context_id: u32) -> Self {
        let shared = CONFIG.with(|c| c.borrow().clone());

        Self {
            context_id,
            shared,
            body_filter: None,
        }
    }
}

impl Context for HtmlFilterHttpContext {}

impl HttpContext for HtmlFilterHttpContext {
    fn on_http_response_headers(&mut self, _num_headers: usize, end_of_stream: bool) -> Action {
        if end_of_stream || !self.shared.is_engaged() {
            return Action::Continue;
        }

        let content_type = self
            .get_http_response_header("content-type")
            .unwrap_or_default();
        if !self.shared.config.is_filterable(&content_type) {
            debug!(
                "[context_id={}] Skipping content-type: {}",
                self.context_id, content_type
            );
            return Action::Continue;
        }

        // The filtered body length is unknown until the last chunk
        self.set_http_response_header("content-length", None);
        self.set_http_response_header("x-html-filter", Some("applied"));

        self.body_filter = Some(StreamingBodyFilter::new(
            Arc::clone(&self.shared.rules),
            self.shared.config.carryover_capacity,
        ));
        debug!("[context_id={}] Filtering HTML response", self.context_id);

        Action::Continue
    }

    fn on_http_response_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        if self.body_filter.is_none() {
            return Action::Continue;
        }

        let mut chunk = self
            .get_http_response_body(0, body_size)
            .unwrap_or_default();
        if let Some(body_filter) = self.body_filter.as_mut() {
            body_filter.on_body_chunk(&mut chunk, end_of_stream);
        }

        debug!(
            "[context_id={}] Body chunk: {} -> {} bytes, end_of_stream: {}",
            self.context_id,
            body_size,
            chunk.len(),
            end_of_stream
        );

        self.set_http_response_body(0, body_size, &chunk);
        Action::Continue
    }

    fn on_log(&mut self) {
        let Some(body_filter) = self.body_filter.as_ref() else {
            return;
        };

        if !body_filter.is_complete() {
            warn!(
                "[context_id={}] Response ended before the end of the HTML body",
                self.context_id
            );
        }

        if self.shared.config.log_documents {
            let mut event = telemetry::audit_document(
                self.context_id,
                body_filter.bytes_in(),
                body_filter.bytes_out(),
            )
            .with_chunks(body_filter.chunks());
            if body_filter.bytes_dropped() > 0 {
                event = event.with_reason(&format!(
                    "{} bytes of an unfinished tag dropped",
                    body_filter.bytes_dropped()
                ));
            }
            event.emit();
        }
    }
}

// Register the filter with proxy-wasm runtime
proxy_wasm::main! {{
    proxy_wasm::set_log_level(LogLevel::Info);
    proxy_wasm::set_root_context(|_| -> Box<dyn RootContext> {
        Box::new(HtmlFilterRootContext::new())
    });
}}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_config_engagement() {
        assert!(!SharedConfig::default().is_engaged());

        let shared = SharedConfig::new(PluginConfig {
            html_filter: "dt=script".to_string(),
            ..Default::default()
        });
        assert!(shared.is_engaged());
        assert_eq!(shared.rules.filter_count(), 1);
    }

    #[test]
    fn test_encoding_only_config_engages() {
        let shared = SharedConfig::new(PluginConfig {
            html_filter: "encoding=internal".to_string(),
            ..Default::default()
        });
        assert!(shared.is_engaged());
        assert_eq!(shared.rules.filter_count(), 0);
    }

    #[test]
    fn test_response_filtered_end_to_end() {
        let shared = SharedConfig::new(PluginConfig {
            html_filter: "dt=script,!doctype;da=onclick".to_string(),
            carryover_capacity: 32,
            ..Default::default()
        });
        let mut body = StreamingBodyFilter::new(Arc::clone(&shared.rules), 32);

        let mut first = b"<!DOCTYPE html><a onclick=\"go()\" hr".to_vec();
        body.on_body_chunk(&mut first, false);
        let mut second = b"ef=\"/x\">Go</a><script>1</script>".to_vec();
        body.on_body_chunk(&mut second, true);

        let mut out = first;
        out.extend_from_slice(&second);
        assert_eq!(out, b"<a href=\"/x\">Go</a>");
    }
}
