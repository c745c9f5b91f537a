// ============================================
// File: crates/meshtun-client/src/tunnel.rs
// ============================================
//! # Tunnel Manager
//!
//! ## Creation Reason
//! Every router or DNS change requires a new tunnel from the platform.
//! The manager turns such a change into builder calls, establishes the
//! tunnel and hands it to the multiplexer, so the engine keeps one
//! device across any number of tunnels.
//!
//! ## Main Functionality
//! - `TunnelManager::update_tun`: apply a router/DNS configuration
//! - `TunnelManager::close_tuns`: drop all tunnels
//! - `TunnelManager::network_changed`: forward default-route changes
//! - `RouterConfig`: addresses and routes of the tunnel
//!
//! ## Update Flow
//! ```text
//! update_tun(rcfg, dcfg)
//!   │ unchanged? ──────────────────────────► Ok
//!   │ handover disabled / ChromeOS ──► shutdown
//!   │ no local addresses ──► shutdown, forget ──► Ok
//!   ▼
//! builder: mtu → dns → routes (routes - local_routes) → addresses
//!   ▼
//! establish ──► multiplexer.add_device ──► remember config
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Updates are serialized; a second caller waits for the first
//! - With seamless handover the old tunnel stays up until the new one
//!   is attached; the multiplexer retires it
//! - A failed update leaves the previous configuration recorded only if
//!   the previous tunnel is still attached
//!
//! ## Last Modified
//! v0.1.0 - Initial tunnel manager

use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use meshtun_routes::compute;
use meshtun_transport::{MultiTun, TunDevice};

use crate::bridge::{AppContext, NetworkMonitor, VpnService, VpnServiceBuilder};
use crate::config::ClientConfig;
use crate::dns::{base_dns_config, DnsConfig};
use crate::error::{ClientError, Result};
use crate::interfaces::{parse_interfaces, Interface, ParseStats};

/// Substring of the platform error raised by the multi-user bug.
const MULTIPLE_USERS_MARKER: &str = "INTERACT_ACROSS_USERS";

// ============================================
// RouterConfig
// ============================================

/// Addresses and routes of a tunnel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterConfig {
    /// Addresses assigned to the tunnel interface.
    pub local_addrs: Vec<IpNet>,
    /// Prefixes routed into the tunnel.
    pub routes: Vec<IpNet>,
    /// Prefixes that must stay off the tunnel.
    pub local_routes: Vec<IpNet>,
}

/// Configuration of the currently attached tunnel.
#[derive(Debug, PartialEq, Eq)]
struct Applied {
    router: RouterConfig,
    dns: Option<DnsConfig>,
}

// ============================================
// TunnelManager
// ============================================

/// Establishes platform tunnels and feeds them to the multiplexer.
pub struct TunnelManager {
    /// Device handed to the engine
    multi: Arc<MultiTun>,
    /// Platform queries
    app: Arc<dyn AppContext>,
    /// Client configuration
    config: ClientConfig,
    /// Last applied configuration; the lock also serializes updates
    applied: tokio::sync::Mutex<Option<Applied>>,
    /// Service that issued the current tunnel
    service: Mutex<Option<Arc<dyn VpnService>>>,
    /// Registered network monitor
    monitor: Mutex<Option<Arc<dyn NetworkMonitor>>>,
    /// Last reported default-route interface
    default_interface: Mutex<String>,
}

impl TunnelManager {
    /// Creates a manager and its multiplexer.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid.
    pub fn new(config: ClientConfig, app: Arc<dyn AppContext>) -> Result<Self> {
        config.validate()?;
        let multi = Arc::new(MultiTun::new(config.multi_tun_config())?);

        Ok(Self {
            multi,
            app,
            config,
            applied: tokio::sync::Mutex::new(None),
            service: Mutex::new(None),
            monitor: Mutex::new(None),
            default_interface: Mutex::new(String::new()),
        })
    }

    /// The multiplexed device for the engine.
    #[must_use]
    pub fn device(&self) -> Arc<MultiTun> {
        Arc::clone(&self.multi)
    }

    /// Applies a router and DNS configuration.
    ///
    /// # Errors
    /// - `Builder`: If the platform rejected a builder call
    /// - `MultipleUsers`: If the platform multi-user restriction applies
    /// - `Establish`: If establishing failed for another reason
    /// - `VpnNotPrepared`: If the VPN permission is missing or revoked
    pub async fn update_tun(
        &self,
        service: Arc<dyn VpnService>,
        rcfg: RouterConfig,
        dcfg: Option<DnsConfig>,
    ) -> Result<()> {
        let mut applied = self.applied.lock().await;

        if applied
            .as_ref()
            .is_some_and(|last| last.router == rcfg && last.dns == dcfg)
        {
            debug!("No change to routes or DNS, ignoring");
            return Ok(());
        }

        info!(
            service = %service.id(),
            addrs = rcfg.local_addrs.len(),
            routes = rcfg.routes.len(),
            "Tunnel configuration changed"
        );

        let chrome_os = self.is_chrome_os();
        if !self.config.tun.seamless_handover || chrome_os {
            debug!(chrome_os, "Closing old tunnels before requesting a new one");
            *applied = None;
            self.shutdown_devices().await;
        }

        if rcfg.local_addrs.is_empty() {
            *applied = None;
            self.shutdown_devices().await;
            *self.service.lock() = None;
            return Ok(());
        }

        *self.service.lock() = Some(Arc::clone(&service));

        let mut builder = service.new_builder();
        self.configure(builder.as_mut(), &rcfg, dcfg.as_ref(), chrome_os)?;

        let device = match builder.establish() {
            Ok(Some(device)) => device,
            Ok(None) => return Err(ClientError::VpnNotPrepared),
            Err(e) if e.message.contains(MULTIPLE_USERS_MARKER) => {
                warn!(error = %e, "Could not establish VPN");
                service.update_vpn_status(false);
                return Err(ClientError::MultipleUsers);
            }
            Err(e) => return Err(ClientError::establish(e.message)),
        };

        service.update_vpn_status(true);
        let id = match self.multi.add_device(Arc::clone(&device)) {
            Ok(id) => id,
            Err(e) => {
                let _ = device.close().await;
                return Err(e.into());
            }
        };
        info!(device_id = %id, "Tunnel established");

        *applied = Some(Applied {
            router: rcfg,
            dns: dcfg,
        });
        Ok(())
    }

    /// Shuts all tunnels down and forgets the applied configuration.
    ///
    /// # Errors
    /// Returns the multiplexer's shutdown error, if any.
    pub async fn close_tuns(&self) -> Result<()> {
        let mut applied = self.applied.lock().await;
        *applied = None;
        *self.service.lock() = None;
        self.multi.shutdown().await?;
        Ok(())
    }

    /// Closes the multiplexer for good.
    ///
    /// # Errors
    /// Returns the last device close error, or `Closed` if already closed.
    pub async fn close(&self) -> Result<()> {
        let mut applied = self.applied.lock().await;
        *applied = None;
        *self.service.lock() = None;
        self.multi.close().await?;
        Ok(())
    }

    /// Records the new default-route interface (`""` when the network
    /// was lost) and alerts the monitor.
    pub fn network_changed(&self, interface_name: &str) {
        *self.default_interface.lock() = interface_name.to_string();

        let monitor = self.monitor.lock().clone();
        match monitor {
            Some(monitor) => monitor.network_changed(interface_name),
            None => debug!(interface_name, "Network changed with no monitor registered"),
        }
    }

    /// Registers the network monitor.
    pub fn set_network_monitor(&self, monitor: Arc<dyn NetworkMonitor>) {
        *self.monitor.lock() = Some(monitor);
    }

    /// Last reported default-route interface.
    #[must_use]
    pub fn default_interface(&self) -> String {
        self.default_interface.lock().clone()
    }

    /// Excludes a socket from the tunnel through the current service.
    ///
    /// Returns `false` when no service is active.
    pub fn protect(&self, fd: i32) -> bool {
        let service = self.service.lock().clone();
        service.is_some_and(|s| s.protect(fd))
    }

    /// Platform DNS configuration with fallback nameservers applied.
    #[must_use]
    pub fn dns_base_config(&self) -> DnsConfig {
        base_dns_config(self.app.as_ref(), &self.config.dns.fallback_nameservers)
    }

    /// Current platform interfaces.
    ///
    /// # Errors
    /// Returns error if the platform query or parsing fails.
    pub fn interfaces(&self) -> Result<(Vec<Interface>, ParseStats)> {
        let text = self
            .app
            .interfaces_as_string()
            .map_err(|e| ClientError::platform("interfaces_as_string", e.message))?;
        parse_interfaces(&text)
    }

    // ========================================
    // Internal
    // ========================================

    fn is_chrome_os(&self) -> bool {
        self.app.is_chrome_os().unwrap_or_else(|e| {
            warn!(error = %e, "ChromeOS check failed, assuming Android");
            false
        })
    }

    async fn shutdown_devices(&self) {
        if let Err(e) = self.multi.shutdown().await {
            warn!(error = %e, "Error while shutting down tunnels");
        }
    }

    fn configure(
        &self,
        builder: &mut dyn VpnServiceBuilder,
        rcfg: &RouterConfig,
        dcfg: Option<&DnsConfig>,
        chrome_os: bool,
    ) -> Result<()> {
        builder
            .set_mtu(self.config.tun.default_mtu)
            .map_err(|e| ClientError::builder("set_mtu", e.message))?;

        if let Some(dns) = dcfg {
            let use_fallback =
                dns.nameservers.is_empty() && (self.config.dns.avoid_empty_dns || chrome_os);
            let nameservers: &[IpAddr] = if use_fallback {
                &self.config.dns.fallback_nameservers
            } else {
                &dns.nameservers
            };

            for server in nameservers {
                builder
                    .add_dns_server(&server.to_string())
                    .map_err(|e| ClientError::builder("add_dns_server", e.message))?;
            }
            for domain in dns.search_domains_without_dot() {
                builder
                    .add_search_domain(domain)
                    .map_err(|e| ClientError::builder("add_search_domain", e.message))?;
            }
            debug!(nameservers = nameservers.len(), "Set nameservers");
        }

        let routes = compute(&rcfg.routes, &rcfg.local_routes);
        for route in routes.iter() {
            builder
                .add_route(&route.network().to_string(), route.prefix_len())
                .map_err(|e| ClientError::builder("add_route", e.message))?;
        }
        debug!(prefixes = routes.len(), "Added routes");

        for addr in &rcfg.local_addrs {
            builder
                .add_address(&addr.addr().to_string(), addr.prefix_len())
                .map_err(|e| ClientError::builder("add_address", e.message))?;
        }
        debug!(addrs = rcfg.local_addrs.len(), "Added local addresses");

        Ok(())
    }
}

impl std::fmt::Debug for TunnelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelManager")
            .field("config", &self.config)
            .field("default_interface", &*self.default_interface.lock())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use meshtun_transport::tun::MockTun;
    use meshtun_transport::TunConfig;
    use tokio::time::timeout;

    use super::*;
    use crate::bridge::{PlatformError, PlatformResult};

    const WAIT: Duration = Duration::from_secs(2);

    // ========================================
    // Platform mocks
    // ========================================

    /// What `establish` should return next.
    enum Outcome {
        Device,
        NotPrepared,
        Fail(&'static str),
    }

    #[derive(Default)]
    struct Platform {
        calls: Mutex<Vec<String>>,
        status: Mutex<Vec<bool>>,
        devices: Mutex<Vec<Arc<MockTun>>>,
        outcomes: Mutex<VecDeque<Outcome>>,
        fail_call: Mutex<Option<&'static str>>,
        protected: Mutex<Vec<i32>>,
        changes: Mutex<Vec<String>>,
    }

    impl Platform {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: &'static str, detail: String) -> PlatformResult<()> {
            if *self.fail_call.lock() == Some(call) {
                return Err(PlatformError::new(format!("{call} rejected")));
            }
            self.calls.lock().push(format!("{call} {detail}"));
            Ok(())
        }

        fn device(&self, i: usize) -> Arc<MockTun> {
            Arc::clone(&self.devices.lock()[i])
        }

        fn builder_count(&self) -> usize {
            self.calls.lock().iter().filter(|c| c.starts_with("set_mtu")).count()
        }
    }

    struct Service(Arc<Platform>);

    impl VpnService for Service {
        fn id(&self) -> String {
            "svc-1".to_string()
        }

        fn protect(&self, fd: i32) -> bool {
            self.0.protected.lock().push(fd);
            true
        }

        fn new_builder(&self) -> Box<dyn VpnServiceBuilder> {
            Box::new(Builder(Arc::clone(&self.0)))
        }

        fn update_vpn_status(&self, active: bool) {
            self.0.status.lock().push(active);
        }
    }

    struct Builder(Arc<Platform>);

    impl VpnServiceBuilder for Builder {
        fn set_mtu(&mut self, mtu: u16) -> PlatformResult<()> {
            self.0.record("set_mtu", mtu.to_string())
        }

        fn add_dns_server(&mut self, server: &str) -> PlatformResult<()> {
            self.0.record("add_dns_server", server.to_string())
        }

        fn add_search_domain(&mut self, domain: &str) -> PlatformResult<()> {
            self.0.record("add_search_domain", domain.to_string())
        }

        fn add_route(&mut self, address: &str, prefix_len: u8) -> PlatformResult<()> {
            self.0.record("add_route", format!("{address}/{prefix_len}"))
        }

        fn add_address(&mut self, address: &str, prefix_len: u8) -> PlatformResult<()> {
            self.0.record("add_address", format!("{address}/{prefix_len}"))
        }

        fn establish(&mut self) -> PlatformResult<Option<Arc<dyn TunDevice>>> {
            // Whether every earlier tunnel was already closed at this point
            let all_closed = self.0.devices.lock().iter().all(|d| d.is_closed());
            self.0.record("establish", format!("previous_closed={all_closed}"))?;

            match self.0.outcomes.lock().pop_front().unwrap_or(Outcome::Device) {
                Outcome::Device => {
                    let n = self.0.devices.lock().len();
                    let tun = Arc::new(MockTun::new(TunConfig::new(format!("tun{n}"))));
                    self.0.devices.lock().push(Arc::clone(&tun));
                    Ok(Some(tun as Arc<dyn TunDevice>))
                }
                Outcome::NotPrepared => Ok(None),
                Outcome::Fail(message) => Err(PlatformError::new(message)),
            }
        }
    }

    struct App {
        chrome_os: bool,
    }

    impl AppContext for App {
        fn is_chrome_os(&self) -> PlatformResult<bool> {
            Ok(self.chrome_os)
        }

        fn is_play_version(&self) -> bool {
            true
        }

        fn interfaces_as_string(&self) -> PlatformResult<String> {
            Ok("wlan0 30 1500 true true false false true | 10.1.10.131/24".to_string())
        }

        fn platform_dns_config(&self) -> String {
            String::new()
        }
    }

    struct Monitor(Arc<Platform>);

    impl NetworkMonitor for Monitor {
        fn network_changed(&self, interface_name: &str) {
            self.0.changes.lock().push(interface_name.to_string());
        }
    }

    // ========================================
    // Helpers
    // ========================================

    fn setup(config: ClientConfig, chrome_os: bool) -> (TunnelManager, Arc<Platform>, Arc<dyn VpnService>) {
        let platform = Arc::new(Platform::default());
        let manager = TunnelManager::new(config, Arc::new(App { chrome_os })).unwrap();
        let service: Arc<dyn VpnService> = Arc::new(Service(Arc::clone(&platform)));
        (manager, platform, service)
    }

    fn nets(list: &[&str]) -> Vec<IpNet> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn router(addr: &str) -> RouterConfig {
        RouterConfig {
            local_addrs: nets(&[addr]),
            routes: nets(&["100.64.0.0/10"]),
            local_routes: Vec::new(),
        }
    }

    fn dns(servers: &[&str], domains: &[&str]) -> DnsConfig {
        DnsConfig {
            nameservers: servers.iter().map(|s| s.parse().unwrap()).collect(),
            search_domains: domains.iter().map(ToString::to_string).collect(),
        }
    }

    async fn wait_closed(tun: &MockTun) {
        timeout(WAIT, async {
            while !tun.is_closed() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("tunnel was never closed");
    }

    // ========================================
    // Update flow
    // ========================================

    #[tokio::test]
    async fn test_update_issues_builder_calls_in_order() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);
        let rcfg = RouterConfig {
            local_addrs: nets(&["100.64.0.2/32", "fd7a:115c:a1e0::2/128"]),
            routes: nets(&["100.64.0.0/10", "fd7a:115c:a1e0::/48"]),
            local_routes: Vec::new(),
        };
        let dcfg = dns(&["100.100.100.100"], &["tailnet.example.", "corp.example"]);

        manager.update_tun(service, rcfg, Some(dcfg)).await.unwrap();

        assert_eq!(
            platform.calls(),
            vec![
                "set_mtu 1280",
                "add_dns_server 100.100.100.100",
                "add_search_domain tailnet.example",
                "add_search_domain corp.example",
                "add_route 100.64.0.0/10",
                "add_route fd7a:115c:a1e0::/48",
                "add_address 100.64.0.2/32",
                "add_address fd7a:115c:a1e0::2/128",
                "establish previous_closed=true",
            ]
        );
        assert_eq!(*platform.status.lock(), vec![true]);
        assert_eq!(manager.device().device_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_routes_exclude_local_routes() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);
        let rcfg = RouterConfig {
            local_addrs: nets(&["100.64.0.2/32"]),
            routes: nets(&["0.0.0.0/0"]),
            local_routes: nets(&["10.0.0.0/8", "192.168.0.0/16"]),
        };

        manager.update_tun(service, rcfg, None).await.unwrap();

        let routes: Vec<String> = platform
            .calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("add_route ").map(str::to_string))
            .collect();
        assert_eq!(routes.first().map(String::as_str), Some("0.0.0.0/5"));
        assert!(routes.contains(&"11.0.0.0/8".to_string()));
        assert!(!routes.iter().any(|r| r.starts_with("10.") || r.starts_with("192.168.")));
        assert!(!platform.calls().iter().any(|c| c.starts_with("add_dns_server")));
    }

    #[tokio::test]
    async fn test_unchanged_config_is_ignored() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);
        let dcfg = dns(&["1.1.1.1"], &[]);

        manager
            .update_tun(Arc::clone(&service), router("100.64.0.2/32"), Some(dcfg.clone()))
            .await
            .unwrap();
        manager
            .update_tun(Arc::clone(&service), router("100.64.0.2/32"), Some(dcfg))
            .await
            .unwrap();
        assert_eq!(platform.builder_count(), 1);

        // A DNS-only change is a change
        manager
            .update_tun(service, router("100.64.0.2/32"), Some(dns(&["9.9.9.9"], &[])))
            .await
            .unwrap();
        assert_eq!(platform.builder_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_local_addrs_shuts_down() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);

        manager
            .update_tun(Arc::clone(&service), router("100.64.0.2/32"), None)
            .await
            .unwrap();
        manager
            .update_tun(Arc::clone(&service), RouterConfig::default(), None)
            .await
            .unwrap();

        assert!(platform.device(0).is_closed());
        assert_eq!(manager.device().device_count().await.unwrap(), 0);
        assert!(!manager.protect(7));

        // The last config was forgotten, so re-applying it establishes again
        manager
            .update_tun(service, router("100.64.0.2/32"), None)
            .await
            .unwrap();
        assert_eq!(platform.builder_count(), 2);
    }

    #[tokio::test]
    async fn test_seamless_handover_keeps_old_tunnel_until_attached() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);

        manager
            .update_tun(Arc::clone(&service), router("100.64.0.2/32"), None)
            .await
            .unwrap();
        manager
            .update_tun(service, router("100.64.0.3/32"), None)
            .await
            .unwrap();

        assert_eq!(platform.calls().last().unwrap(), "establish previous_closed=false");
        wait_closed(&platform.device(0)).await;
        assert!(!platform.device(1).is_closed());
    }

    #[tokio::test]
    async fn test_handover_disabled_closes_first() {
        let mut config = ClientConfig::default();
        config.tun.seamless_handover = false;
        let (manager, platform, service) = setup(config, false);

        manager
            .update_tun(Arc::clone(&service), router("100.64.0.2/32"), None)
            .await
            .unwrap();
        manager
            .update_tun(service, router("100.64.0.3/32"), None)
            .await
            .unwrap();

        assert_eq!(platform.calls().last().unwrap(), "establish previous_closed=true");
    }

    #[tokio::test]
    async fn test_chrome_os_closes_first_and_avoids_empty_dns() {
        let (manager, platform, service) = setup(ClientConfig::default(), true);

        manager
            .update_tun(Arc::clone(&service), router("100.64.0.2/32"), Some(dns(&[], &[])))
            .await
            .unwrap();
        let servers: Vec<String> = platform
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("add_dns_server"))
            .collect();
        assert_eq!(
            servers,
            vec![
                "add_dns_server 8.8.8.8",
                "add_dns_server 8.8.4.4",
                "add_dns_server 2001:4860:4860::8888",
                "add_dns_server 2001:4860:4860::8844",
            ]
        );

        manager
            .update_tun(service, router("100.64.0.3/32"), None)
            .await
            .unwrap();
        assert_eq!(platform.calls().last().unwrap(), "establish previous_closed=true");
    }

    #[tokio::test]
    async fn test_avoid_empty_dns_uses_configured_fallback() {
        let mut config = ClientConfig::default();
        config.dns.avoid_empty_dns = true;
        config.dns.fallback_nameservers = vec!["9.9.9.9".parse().unwrap()];
        let (manager, platform, service) = setup(config, false);

        manager
            .update_tun(service, router("100.64.0.2/32"), Some(dns(&[], &[])))
            .await
            .unwrap();
        assert!(platform.calls().contains(&"add_dns_server 9.9.9.9".to_string()));
    }

    // ========================================
    // Establish failures
    // ========================================

    #[tokio::test]
    async fn test_multiple_users_error() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);
        platform.outcomes.lock().push_back(Outcome::Fail(
            "java.lang.SecurityException: INTERACT_ACROSS_USERS required",
        ));

        let err = manager
            .update_tun(service, router("100.64.0.2/32"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MultipleUsers));
        assert_eq!(*platform.status.lock(), vec![false]);
    }

    #[tokio::test]
    async fn test_other_establish_error() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);
        platform.outcomes.lock().push_back(Outcome::Fail("no route to host"));

        let err = manager
            .update_tun(service, router("100.64.0.2/32"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Establish { ref reason } if reason == "no route to host"));
        assert!(platform.status.lock().is_empty());
    }

    #[tokio::test]
    async fn test_not_prepared_is_not_recorded() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);
        platform.outcomes.lock().push_back(Outcome::NotPrepared);

        let err = manager
            .update_tun(Arc::clone(&service), router("100.64.0.2/32"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::VpnNotPrepared));
        assert_eq!(manager.device().device_count().await.unwrap(), 0);

        // Same config again is retried, not ignored
        manager
            .update_tun(service, router("100.64.0.2/32"), None)
            .await
            .unwrap();
        assert_eq!(platform.builder_count(), 2);
    }

    #[tokio::test]
    async fn test_builder_failure_names_the_call() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);
        *platform.fail_call.lock() = Some("add_address");

        let err = manager
            .update_tun(service, router("100.64.0.2/32"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Builder { call: "add_address", .. }));
        assert!(platform.devices.lock().is_empty());
    }

    // ========================================
    // Close / platform passthrough
    // ========================================

    #[tokio::test]
    async fn test_close_tuns_forgets_config() {
        let (manager, platform, service) = setup(ClientConfig::default(), false);

        manager
            .update_tun(Arc::clone(&service), router("100.64.0.2/32"), None)
            .await
            .unwrap();
        assert!(manager.protect(42));
        assert_eq!(*platform.protected.lock(), vec![42]);

        manager.close_tuns().await.unwrap();
        assert!(platform.device(0).is_closed());
        assert!(!manager.protect(43));

        manager
            .update_tun(service, router("100.64.0.2/32"), None)
            .await
            .unwrap();
        assert_eq!(platform.builder_count(), 2);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let (manager, _platform, service) = setup(ClientConfig::default(), false);

        manager.close().await.unwrap();
        let err = manager
            .update_tun(service, router("100.64.0.2/32"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn test_network_changed_reaches_monitor() {
        let (manager, platform, _service) = setup(ClientConfig::default(), false);

        manager.network_changed("wlan0");
        assert_eq!(manager.default_interface(), "wlan0");
        assert!(platform.changes.lock().is_empty());

        manager.set_network_monitor(Arc::new(Monitor(Arc::clone(&platform))));
        manager.network_changed("rmnet0");
        manager.network_changed("");
        assert_eq!(*platform.changes.lock(), vec!["rmnet0".to_string(), String::new()]);
        assert_eq!(manager.default_interface(), "");
    }

    #[tokio::test]
    async fn test_platform_queries() {
        let (manager, _platform, _service) = setup(ClientConfig::default(), false);

        let (ifaces, stats) = manager.interfaces().unwrap();
        assert_eq!(ifaces[0].name, "wlan0");
        assert_eq!(stats.addrs_parsed, 1);

        // Play build with no platform nameservers
        assert_eq!(manager.dns_base_config().nameservers.len(), 4);
    }
}
