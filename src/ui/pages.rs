use chrono::Local;
use eframe::egui::{self, RichText, Ui};

use qevr::config::Target;
use qevr::data::export::report_file_name;
use qevr::data::filter::FilterMode;

use crate::state::{AppState, Page};

const INTRO_TEXT: &str =
    "QeVR helps to upload Qualys security scans to TippingPoint SMS server for profile tuning.";

const NETWORKS_HINT: &str = "Specify networks in form \"2.1.0.0/24\" (without quotes).\n\
                             Put one network per line.\n\
                             \"#\" character can be used for comment.";

// ---------------------------------------------------------------------------
// Central panel – one function per wizard page
// ---------------------------------------------------------------------------

pub fn page_content(ui: &mut Ui, state: &mut AppState) {
    ui.add_space(8.0);
    match state.page {
        Page::Intro => intro(ui),
        Page::Source => source(ui, state),
        Page::Filter => filter(ui, state),
        Page::Load => load(ui, state),
        Page::Target => target(ui, state),
        Page::Output => output(ui, state),
        Page::Sms => sms(ui, state),
        Page::Upload => upload(ui, state),
        Page::Finish => finish(ui, state),
    }
}

fn intro(ui: &mut Ui) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(RichText::new("QeVR").strong());
        ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
    });
    ui.add_space(12.0);
    ui.label(INTRO_TEXT);
}

fn source(ui: &mut Ui, state: &mut AppState) {
    ui.label("Source CSV file:");
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Change…").clicked() {
            if let Some(path) = rfd::FileDialog::new()
                .set_title("Open vulnerability scan")
                .add_filter("CSV", &["csv"])
                .pick_file()
            {
                state.source_text = path.display().to_string();
            }
        }
        ui.add(egui::TextEdit::singleline(&mut state.source_text).desired_width(f32::INFINITY));
    });
    ui.checkbox(&mut state.config.has_header, "First row is a header");
}

fn filter(ui: &mut Ui, state: &mut AppState) {
    for mode in FilterMode::ALL {
        ui.radio_value(&mut state.config.filter.mode, mode, mode.label());
    }
    ui.add_space(4.0);
    ui.add(
        egui::TextEdit::multiline(&mut state.networks_text)
            .desired_rows(8)
            .desired_width(f32::INFINITY)
            .hint_text("10.0.0.0/8"),
    );
    ui.label(NETWORKS_HINT);

    ui.add_space(8.0);
    ui.horizontal(|ui: &mut Ui| {
        ui.label("CVEs per record:");
        ui.add(
            egui::DragValue::new(&mut state.config.output.max_cves_per_record).range(1..=100_000),
        );
    });
}

fn load(ui: &mut Ui, state: &mut AppState) {
    ui.add(egui::ProgressBar::new(state.progress.read_fraction()).show_percentage());
    ui.label(state.load_status());
}

fn target(ui: &mut Ui, state: &mut AppState) {
    if let Some(model) = &state.model {
        ui.label(model.final_status());
    }
    ui.add_space(4.0);
    for target in Target::ALL {
        ui.radio_value(&mut state.config.output.target, target, target.label());
    }
}

fn output(ui: &mut Ui, state: &mut AppState) {
    let file = &mut state.config.output.file;
    egui::Grid::new("output_form")
        .num_columns(2)
        .spacing([12.0, 8.0])
        .show(ui, |ui: &mut Ui| {
            ui.label("Suffix for filename:");
            ui.text_edit_singleline(&mut file.suffix);
            ui.end_row();

            ui.label("Save to folder:");
            ui.horizontal(|ui: &mut Ui| {
                ui.text_edit_singleline(&mut file.folder);
                if ui.button("Change…").clicked() {
                    if let Some(folder) = rfd::FileDialog::new().pick_folder() {
                        file.folder = folder.display().to_string();
                    }
                }
            });
            ui.end_row();
        });
    ui.add_space(8.0);
    ui.small(report_file_name(Local::now().date_naive(), &file.suffix));
}

fn sms(ui: &mut Ui, state: &mut AppState) {
    let sms = &mut state.config.output.sms;
    egui::Grid::new("sms_form")
        .num_columns(2)
        .spacing([12.0, 8.0])
        .show(ui, |ui: &mut Ui| {
            ui.label("SMS Server Address:");
            ui.text_edit_singleline(&mut sms.address);
            ui.end_row();

            ui.label("On TLS errors:");
            ui.checkbox(&mut sms.ignore_tls_errors, "Ignore");
            ui.end_row();

            ui.label("API Key:");
            ui.add(egui::TextEdit::singleline(&mut sms.api_key).password(true));
            ui.end_row();

            ui.label("Timeout (seconds):");
            ui.add(egui::DragValue::new(&mut sms.timeout_secs).range(0..=3600));
            ui.end_row();
        });
}

fn upload(ui: &mut Ui, state: &mut AppState) {
    if state.busy() {
        let fraction = state.progress.upload_fraction();
        if fraction < 1.0 {
            ui.add(egui::ProgressBar::new(fraction).show_percentage());
            ui.label(state.status_message.as_str());
        } else {
            // Body fully sent, waiting for the server to process it
            ui.horizontal(|ui: &mut Ui| {
                ui.spinner();
                ui.label("Processing...");
            });
        }
    } else {
        ui.label(state.status_message.as_str());
    }
}

fn finish(ui: &mut Ui, state: &mut AppState) {
    ui.label("Thank you for using QeVR.\nYou can now close this window.");
    if !state.status_message.is_empty() {
        ui.add_space(8.0);
        ui.small(state.status_message.as_str());
    }
}
