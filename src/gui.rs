// src/gui.rs
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use anyhow::Context;
use eframe::egui;
use egui::Color32;
use egui_plot::{Line, Plot, PlotPoints};

use crate::config::{ConfigStore, NetworkSettings, SerialSettings, SessionConfig, TransportConfig};
use crate::drivers::{
    available_ports, format_remaining, IntervalUnit, SampleInterval, SessionError, Statistics,
};
use crate::engine::SessionController;
use crate::types::{SessionEvent, SessionState};

const MAX_MESSAGES: usize = 8;
const ACQUIRING_REPAINT: Duration = Duration::from_millis(50);

pub struct DataloggerApp {
    controller: SessionController,
    events: Receiver<SessionEvent>,
    store: ConfigStore,

    // connection form
    use_network: bool,
    serial: SerialSettings,
    network: NetworkSettings,
    ports: Vec<String>,

    // acquisition form
    interval: SampleInterval,
    capacity: usize,
    use_filter: bool,
    display_min: f64,
    display_max: f64,
    clear_on_start: bool,

    // files
    file_path: String,
    export_csv: bool,

    // latest readings
    last_value: Option<f64>,
    fill: f64,
    remaining: Duration,
    stats: Option<Statistics>,
    messages: Vec<String>,
}

impl DataloggerApp {
    pub fn new(config: SessionConfig, store: ConfigStore) -> anyhow::Result<Self> {
        let (tx, rx) = channel();
        let controller =
            SessionController::new(config.clone(), tx).context("invalid session settings")?;
        let (use_network, serial, network) = match &config.transport {
            TransportConfig::Serial(s) => (false, s.clone(), NetworkSettings::default()),
            TransportConfig::Network(n) => (true, SerialSettings::default(), n.clone()),
        };
        let remaining = controller.remaining_time();
        Ok(Self {
            controller,
            events: rx,
            store,
            use_network,
            serial,
            network,
            ports: available_ports(),
            interval: config.interval,
            capacity: config.buffer_capacity,
            use_filter: config.use_filter,
            display_min: config.display_min,
            display_max: config.display_max,
            clear_on_start: true,
            file_path: "dataset.lfd".to_owned(),
            export_csv: false,
            last_value: None,
            fill: 0.0,
            remaining,
            stats: None,
            messages: vec!["Ready.".to_owned()],
        })
    }

    fn log(&mut self, msg: impl Into<String>) {
        self.messages.push(format!("> {}", msg.into()));
        if self.messages.len() > MAX_MESSAGES {
            self.messages.remove(0);
        }
    }

    fn report(&mut self, result: Result<(), SessionError>) {
        if let Err(e) = result {
            self.log(format!("error: {e}"));
        }
    }

    fn drain_events(&mut self) {
        self.controller.poll();
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::StateChanged(state) => self.log(format!("state: {state}")),
                SessionEvent::SampleReady { value, .. } => self.last_value = Some(value),
                SessionEvent::FillRatio(ratio) => self.fill = ratio,
                SessionEvent::RemainingTime(remaining) => self.remaining = remaining,
                SessionEvent::AcquisitionStopped(reason) => {
                    self.stats = self.controller.statistics();
                    self.log(format!("acquisition stopped ({reason:?})"));
                }
                SessionEvent::Error(msg) => self.log(format!("error: {msg}")),
            }
        }
    }

    /// Copies settings the controller may have changed (after a load).
    fn sync_from_controller(&mut self) {
        let config = self.controller.config();
        self.interval = config.interval;
        self.capacity = config.buffer_capacity;
        self.display_min = config.display_min;
        self.display_max = config.display_max;
        self.stats = self.controller.statistics();
    }

    fn transport_form(&self) -> TransportConfig {
        if self.use_network {
            TransportConfig::Network(self.network.clone())
        } else {
            TransportConfig::Serial(self.serial.clone())
        }
    }

    fn connection_panel(&mut self, ui: &mut egui::Ui) {
        let state = self.controller.state();
        ui.heading("Connection");
        ui.add_enabled_ui(!state.is_connected(), |ui| {
            ui.horizontal(|ui| {
                ui.radio_value(&mut self.use_network, false, "Serial");
                ui.radio_value(&mut self.use_network, true, "TCP");
            });
            if self.use_network {
                ui.horizontal(|ui| {
                    ui.label("Host");
                    ui.text_edit_singleline(&mut self.network.host);
                });
                ui.horizontal(|ui| {
                    ui.label("Port");
                    ui.add(egui::DragValue::new(&mut self.network.port).clamp_range(1..=65535));
                });
            } else {
                ui.horizontal(|ui| {
                    egui::ComboBox::from_id_source("serial_port")
                        .selected_text(if self.serial.port_name.is_empty() {
                            "select port"
                        } else {
                            self.serial.port_name.as_str()
                        })
                        .show_ui(ui, |ui| {
                            for port in &self.ports {
                                ui.selectable_value(&mut self.serial.port_name, port.clone(), port);
                            }
                        });
                    if ui.button("Rescan").clicked() {
                        self.ports = available_ports();
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Baud");
                    ui.add(egui::DragValue::new(&mut self.serial.baud_rate).clamp_range(300..=2_000_000));
                    ui.checkbox(&mut self.serial.dtr, "DTR");
                });
            }
        });

        ui.horizontal(|ui| {
            if !state.is_connected() {
                if ui.button("Connect").clicked() {
                    let transport = self.transport_form();
                    let result = self
                        .controller
                        .configure_transport(transport)
                        .and_then(|_| self.controller.connect());
                    self.report(result);
                }
            } else if ui
                .add_enabled(!state.is_acquiring(), egui::Button::new("Disconnect"))
                .clicked()
            {
                let result = self.controller.disconnect();
                self.report(result);
            }
        });
    }

    fn acquisition_panel(&mut self, ui: &mut egui::Ui) {
        let state = self.controller.state();
        let acquiring = state.is_acquiring();
        ui.heading("Acquisition");

        ui.add_enabled_ui(!acquiring, |ui| {
            ui.horizontal(|ui| {
                for unit in [
                    IntervalUnit::Milliseconds,
                    IntervalUnit::Seconds,
                    IntervalUnit::Minutes,
                ] {
                    ui.radio_value(&mut self.interval.unit, unit, unit.label());
                }
            });
            let (min, max) = self.interval.unit.range();
            self.interval.magnitude = self.interval.magnitude.clamp(min, max);
            ui.horizontal(|ui| {
                ui.label("Interval");
                ui.add(egui::DragValue::new(&mut self.interval.magnitude).clamp_range(min..=max));
            });
            if self.interval != self.controller.config().interval {
                let result = self.controller.set_interval(self.interval);
                self.report(result);
            }

            ui.horizontal(|ui| {
                ui.label("Buffer");
                ui.add(egui::DragValue::new(&mut self.capacity).clamp_range(1..=1_000_000));
                if ui.button("Resize").clicked() {
                    let result = self.controller.set_capacity(self.capacity);
                    self.report(result);
                }
            });
            if ui.checkbox(&mut self.use_filter, "ADC to volts").changed() {
                let result = self.controller.set_filter(self.use_filter);
                self.report(result);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Y range");
            ui.add(egui::DragValue::new(&mut self.display_min).speed(0.1));
            ui.add(egui::DragValue::new(&mut self.display_max).speed(0.1));
            if ui.button("Apply").clicked() {
                let result = self
                    .controller
                    .set_display_range(self.display_min, self.display_max);
                self.report(result);
            }
        });

        ui.checkbox(&mut self.clear_on_start, "Clear buffer on start");
        ui.horizontal(|ui| {
            let label = if acquiring { "Stop" } else { "Start" };
            if ui
                .add_enabled(state.is_connected(), egui::Button::new(label))
                .clicked()
            {
                let result = if acquiring {
                    self.controller.stop_acquisition()
                } else {
                    self.controller.start_acquisition(self.clear_on_start)
                };
                self.report(result);
            }
            if ui.button("Clear").clicked() {
                let result = self.controller.clear_buffer(false);
                self.report(result);
                self.stats = None;
            }
        });
    }

    fn file_panel(&mut self, ui: &mut egui::Ui) {
        let acquiring = self.controller.state().is_acquiring();
        ui.heading("Dataset");
        ui.text_edit_singleline(&mut self.file_path);
        ui.checkbox(&mut self.export_csv, "Also export CSV");
        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                let path = PathBuf::from(self.file_path.trim());
                match self.controller.save_dataset(&path, self.export_csv) {
                    Ok(saved) => self.log(format!("saved {}", saved.display())),
                    Err(e) => self.log(format!("error: {e}")),
                }
            }
            if ui
                .add_enabled(!acquiring, egui::Button::new("Load"))
                .clicked()
            {
                let path = PathBuf::from(self.file_path.trim());
                let result = self.controller.load_dataset(&path);
                if result.is_ok() {
                    self.sync_from_controller();
                    self.log(format!("loaded {}", path.display()));
                }
                self.report(result);
            }
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("{}", self.controller.state()));
            ui.separator();
            ui.add(
                egui::ProgressBar::new(self.fill as f32)
                    .desired_width(160.0)
                    .show_percentage(),
            );
            ui.separator();
            ui.label(format_remaining(self.remaining));
            if let Some(value) = self.last_value {
                ui.separator();
                ui.label(format!("last: {value:.3} {}", self.controller.config().y_unit));
            }
            if let Some(stats) = &self.stats {
                ui.separator();
                ui.label(format!(
                    "mean {:.3}  median {:.3}  var {:.3}  std {:.3}",
                    stats.mean, stats.median, stats.variance, stats.std_dev
                ));
            }
        });
    }

    fn plot(&self, ui: &mut egui::Ui) {
        let config = self.controller.config();
        let [r, g, b] = config.line_color;
        let points: PlotPoints = self
            .controller
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(i, v)| [i as f64, v])
            .collect();
        ui.heading(config.title.as_str());
        Plot::new("samples")
            .include_y(config.display_min)
            .include_y(config.display_max)
            .x_axis_label("Samples")
            .y_axis_label(format!("{} ({})", config.y_label, config.y_unit))
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(points).color(Color32::from_rgb(r, g, b)));
            });
    }
}

impl eframe::App for DataloggerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        egui::SidePanel::left("controls")
            .min_width(280.0)
            .show(ctx, |ui| {
                self.connection_panel(ui);
                ui.separator();
                self.acquisition_panel(ui);
                ui.separator();
                self.file_panel(ui);
                ui.separator();
                for msg in &self.messages {
                    ui.label(egui::RichText::new(msg).monospace().small());
                }
            });
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.plot(ui));

        if self.controller.state() == SessionState::Acquiring {
            ctx.request_repaint_after(ACQUIRING_REPAINT);
        }
    }
}

impl Drop for DataloggerApp {
    fn drop(&mut self) {
        let mut config = self.controller.config().clone();
        config.transport = self.transport_form();
        if let Err(e) = self.store.save(&config) {
            log::warn!("settings not saved: {e}");
        }
    }
}
