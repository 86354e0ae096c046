use crate::controller_command::{ControllerCallback, ControllerCommandKind};
use crate::driver::{Driver, DriverCommand, DriverOptions};
use crate::error::{Error, Result};
use crate::notify::{WatcherCallback, Watchers};
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use typed_builder::TypedBuilder;
use zmesh_core::definitions::{HomeId, NodeId};
use zmesh_core::notification::Notification;
use zmesh_core::values::{ValueContents, ValueId};
use zmesh_logging::LogSink;
use zmesh_serial::binding::PortBinding;
use zmesh_serial::serialport::SerialPortBinding;

/// How long a consumer call waits for the driver thread to answer.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(TypedBuilder)]
pub struct ManagerOptions {
    /// Where the per-HomeId XML documents live; None disables persistence
    #[builder(default, setter(into))]
    pub config_dir: Option<PathBuf>,
    /// Full pass of the poll list
    #[builder(default = Duration::from_secs(30))]
    pub poll_interval: Duration,
    #[builder(default, setter(into))]
    pub log_sink: Option<Arc<dyn LogSink>>,
    /// Test hook: shrink the per-frame retry window
    #[builder(default = Duration::from_secs(5))]
    pub transaction_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The process-wide entry point: owns one driver per serial device and the
/// shared watcher registry. There is no hidden global state; create one,
/// pass it around.
pub struct Manager {
    options: ManagerOptions,
    watchers: Arc<Watchers>,
    drivers: Mutex<Vec<Driver>>,
}

impl Manager {
    pub fn new(options: ManagerOptions) -> Self {
        Self {
            options,
            watchers: Arc::new(Watchers::new()),
            drivers: Mutex::new(Vec::new()),
        }
    }

    fn driver_options(&self) -> DriverOptions {
        DriverOptions::builder()
            .transaction_timeout(self.options.transaction_timeout)
            .poll_interval(self.options.poll_interval)
            .config_dir(self.options.config_dir.clone())
            .log_sink(self.options.log_sink.clone())
            .build()
    }

    /// Opens the real serial device and starts its driver.
    pub fn add_driver(&self, device: &str) -> Result<()> {
        self.add_driver_with(device, SerialPortBinding::new(device))
    }

    /// Starts a driver over any transport; tests plug the mock binding in
    /// here.
    pub fn add_driver_with<B>(&self, device: &str, binding: B) -> Result<()>
    where
        B: PortBinding,
        B::Open: Send + 'static,
    {
        let driver = Driver::start(
            device,
            binding,
            self.driver_options(),
            self.watchers.clone(),
        )?;
        if let Ok(mut drivers) = self.drivers.lock() {
            drivers.push(driver);
        }
        Ok(())
    }

    /// Stops the driver for a device and persists its state.
    pub fn remove_driver(&self, device: &str) -> Result<()> {
        let driver = {
            let mut drivers = self.drivers.lock().map_err(|_| Error::DriverGone)?;
            let index = drivers
                .iter()
                .position(|driver| driver.device() == device)
                .ok_or_else(|| Error::UnknownDevice(device.to_string()))?;
            drivers.remove(index)
        };
        driver.shutdown();
        Ok(())
    }

    /// Registers a notification callback. It runs on the driver thread and
    /// must not block or re-enter the driver beyond lightweight getters.
    pub fn add_watcher(&self, callback: WatcherCallback) {
        self.watchers.add_watcher(callback);
    }

    /// Channel-flavored notification stream.
    pub fn notifications(&self) -> Receiver<Notification> {
        self.watchers.subscribe()
    }

    fn with_driver<T>(
        &self,
        home_id: HomeId,
        f: impl FnOnce(&Driver) -> Result<T>,
    ) -> Result<T> {
        let drivers = self.drivers.lock().map_err(|_| Error::DriverGone)?;
        let driver = drivers
            .iter()
            .find(|driver| driver.home_id() == Some(home_id))
            .ok_or(Error::UnknownHomeId(home_id))?;
        f(driver)
    }

    /// Writes a value. Returns whether the driver accepted it (known,
    /// writable, type-correct). The remote confirmation arrives later as a
    /// ValueRefreshed notification.
    pub fn set_value(&self, value_id: ValueId, contents: ValueContents) -> Result<bool> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.with_driver(value_id.home_id, |driver| {
            driver.command(DriverCommand::SetValue {
                value_id,
                contents,
                reply,
            })
        })?;
        rx.recv_timeout(REPLY_TIMEOUT).map_err(|_| Error::DriverGone)
    }

    /// Reads the driver's current copy of a value. A write through
    /// [`Manager::set_value`] is visible here immediately.
    pub fn get_value(&self, value_id: ValueId) -> Result<Option<ValueContents>> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.with_driver(value_id.home_id, |driver| {
            driver.command(DriverCommand::GetValue { value_id, reply })
        })?;
        rx.recv_timeout(REPLY_TIMEOUT).map_err(|_| Error::DriverGone)
    }

    /// Asks the device for the current state behind a value.
    pub fn refresh_value(&self, value_id: ValueId) -> Result<()> {
        self.with_driver(value_id.home_id, |driver| {
            driver.command(DriverCommand::RefreshValue { value_id })
        })
    }

    pub fn enable_poll(&self, value_id: ValueId, intensity: u8) -> Result<()> {
        self.with_driver(value_id.home_id, |driver| {
            driver.command(DriverCommand::EnablePoll {
                value_id,
                intensity,
            })
        })
    }

    pub fn disable_poll(&self, value_id: ValueId) -> Result<()> {
        self.with_driver(value_id.home_id, |driver| {
            driver.command(DriverCommand::DisablePoll { value_id })
        })
    }

    pub fn set_node_name(&self, home_id: HomeId, node_id: NodeId, name: &str) -> Result<()> {
        self.with_driver(home_id, |driver| {
            driver.command(DriverCommand::SetNodeName {
                node_id,
                name: name.to_string(),
            })
        })
    }

    pub fn set_node_location(
        &self,
        home_id: HomeId,
        node_id: NodeId,
        location: &str,
    ) -> Result<()> {
        self.with_driver(home_id, |driver| {
            driver.command(DriverCommand::SetNodeLocation {
                node_id,
                location: location.to_string(),
            })
        })
    }

    pub fn request_config_param(&self, home_id: HomeId, node_id: NodeId, param: u8) -> Result<()> {
        self.with_driver(home_id, |driver| {
            driver.command(DriverCommand::RequestConfigParam { node_id, param })
        })
    }

    pub fn set_config_param(
        &self,
        home_id: HomeId,
        node_id: NodeId,
        param: u8,
        value: i32,
        size: u8,
    ) -> Result<()> {
        self.with_driver(home_id, |driver| {
            driver.command(DriverCommand::SetConfigParam {
                node_id,
                param,
                value,
                size,
            })
        })
    }

    /// Starts a controller-management operation. Returns false when
    /// another one is already in progress.
    pub fn begin_controller_command(
        &self,
        home_id: HomeId,
        kind: ControllerCommandKind,
        callback: Option<ControllerCallback>,
        high_power: bool,
        target: Option<NodeId>,
    ) -> Result<bool> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.with_driver(home_id, |driver| {
            driver.command(DriverCommand::BeginControllerCommand {
                kind,
                callback,
                high_power,
                target,
                reply,
            })
        })?;
        rx.recv_timeout(REPLY_TIMEOUT).map_err(|_| Error::DriverGone)
    }

    pub fn cancel_controller_command(&self, home_id: HomeId) -> Result<()> {
        self.with_driver(home_id, |driver| {
            driver.command(DriverCommand::CancelControllerCommand)
        })
    }

    /// Deletes all node records and re-runs discovery.
    pub fn refresh_node_info(&self, home_id: HomeId) -> Result<()> {
        self.with_driver(home_id, |driver| {
            driver.command(DriverCommand::RefreshNodeInfo)
        })
    }

    /// Persists the network to its XML document now.
    pub fn write_config(&self, home_id: HomeId) -> Result<bool> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.with_driver(home_id, |driver| {
            driver.command(DriverCommand::WriteConfig { reply })
        })?;
        rx.recv_timeout(REPLY_TIMEOUT).map_err(|_| Error::DriverGone)
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Ok(mut drivers) = self.drivers.lock() {
            for driver in drivers.drain(..) {
                driver.shutdown();
            }
        }
    }
}
