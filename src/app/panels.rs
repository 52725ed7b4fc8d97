//! Edit and analysis panel contents

use super::{EditMode, EditorApp, PickTarget};
use crate::{
    aggregate::MapGraph,
    analysis::{self, EdgeImpact},
    commands::{
        BackgroundCommand, ConnectionCommand, LabelCommand, MapCommand, NodeCommand, TaskCommand,
    },
    value_objects::RailColor,
    NodeId,
};
use eframe::egui;
use rand::SeedableRng;

impl EditorApp {
    pub(super) fn edit_panel_contents(&mut self, ui: &mut egui::Ui) {
        let Some(map) = self.current_map() else {
            return;
        };
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Edit mode");
            for mode in [
                EditMode::MoveNodes,
                EditMode::MoveLabels,
                EditMode::MoveSegments,
            ] {
                ui.radio_value(&mut self.edit_mode, mode, mode.label());
            }
            ui.separator();

            self.add_location_section(ui);
            ui.separator();
            self.add_connection_section(ui, &map);
            ui.separator();
            self.task_section(ui, &map);
            ui.separator();
            self.selection_section(ui, &map);
            ui.separator();
            self.layout_section(ui);
            ui.separator();
            self.background_section(ui, &map);
            ui.separator();
            self.export_section(ui);
        });
    }

    fn add_location_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Locations");
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.new_location_name);
            if ui.button("Add").clicked() && !self.new_location_name.trim().is_empty() {
                let name = self.new_location_name.trim().to_string();
                if self.dispatch(MapCommand::Node(NodeCommand::Add {
                    name,
                    position: self.camera.center,
                })) {
                    self.new_location_name.clear();
                }
            }
        });
    }

    fn node_combo(
        &self,
        ui: &mut egui::Ui,
        id_salt: &str,
        label: &str,
        selected: &mut Option<NodeId>,
    ) {
        let selected_name = selected
            .and_then(|id| {
                self.locations
                    .locations(&self.map_id)
                    .iter()
                    .find(|e| e.node_id == id)
                    .map(|e| e.name.clone())
            })
            .unwrap_or_else(|| "—".to_string());
        ui.horizontal(|ui| {
            ui.label(label);
            egui::ComboBox::from_id_salt(id_salt)
                .selected_text(selected_name)
                .show_ui(ui, |ui| {
                    for entry in self.locations.locations(&self.map_id) {
                        ui.selectable_value(selected, Some(entry.node_id), &entry.name);
                    }
                });
        });
    }

    fn color_combo(ui: &mut egui::Ui, id_salt: &str, color: &mut RailColor) {
        egui::ComboBox::from_id_salt(id_salt)
            .selected_text(color.as_str().to_string())
            .show_ui(ui, |ui| {
                for candidate in RailColor::named() {
                    let label = candidate.as_str().to_string();
                    ui.selectable_value(color, candidate, label);
                }
            });
    }

    fn add_connection_section(&mut self, ui: &mut egui::Ui, _map: &MapGraph) {
        ui.heading("Connections");
        let mut from = self.connection_from;
        let mut to = self.connection_to;
        self.node_combo(ui, "conn_from", "From", &mut from);
        self.node_combo(ui, "conn_to", "To", &mut to);
        self.connection_from = from;
        self.connection_to = to;
        ui.horizontal(|ui| {
            ui.label("Length");
            ui.add(egui::DragValue::new(&mut self.connection_length).range(1..=12));
            Self::color_combo(ui, "conn_color", &mut self.connection_color);
        });
        if ui.button("Add connection").clicked() {
            if let (Some(source), Some(target)) = (self.connection_from, self.connection_to) {
                self.dispatch(MapCommand::Connection(ConnectionCommand::Add {
                    source,
                    target,
                    length: self.connection_length,
                    color: self.connection_color.clone(),
                }));
            }
        }
    }

    fn task_section(&mut self, ui: &mut egui::Ui, map: &MapGraph) {
        ui.heading("Tasks");
        let mut from = self.task_from;
        let mut to = self.task_to;
        self.node_combo(ui, "task_from", "From", &mut from);
        self.node_combo(ui, "task_to", "To", &mut to);
        self.task_from = from;
        self.task_to = to;
        if ui.button("Add task").clicked() {
            if let (Some(from), Some(to)) = (self.task_from, self.task_to) {
                self.dispatch(MapCommand::Task(TaskCommand::Add {
                    stops: vec![from, to],
                }));
            }
        }
        if ui.button("Recompute task lengths").clicked() {
            self.dispatch(MapCommand::Task(TaskCommand::RecomputeLengths));
        }

        let mut remove = None;
        for task in map.tasks() {
            ui.horizontal(|ui| {
                let length = task
                    .length
                    .map_or_else(|| "no route".to_string(), |l| l.to_string());
                ui.label(format!("{} ({length})", task.name));
                if ui.small_button("✖").clicked() {
                    remove = Some(task.id);
                }
            });
        }
        if let Some(task_id) = remove {
            self.dispatch(MapCommand::Task(TaskCommand::Remove { task_id }));
        }
    }

    /// Edit controls for the element selected on the canvas
    fn selection_section(&mut self, ui: &mut egui::Ui, map: &MapGraph) {
        ui.heading("Selection");
        let Some(selection) = self.selection else {
            ui.label("Nothing selected");
            return;
        };

        // Refresh text buffers when the selection changes.
        if self.last_selection != Some(selection) {
            self.last_selection = Some(selection);
            match selection {
                PickTarget::Node(node_id) => {
                    self.rename_buffer = map
                        .node(node_id)
                        .map(|n| n.name.clone())
                        .unwrap_or_default();
                }
                PickTarget::Label(node_id) => {
                    self.label_buffer = map
                        .label(node_id)
                        .map(|l| l.text.clone())
                        .unwrap_or_default();
                }
                PickTarget::Segment(..) => {}
            }
        }

        match selection {
            PickTarget::Node(node_id) => {
                let Ok(node) = map.node(node_id) else {
                    self.selection = None;
                    return;
                };
                ui.label(format!("Location: {}", node.name));
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.rename_buffer);
                    if ui.button("Rename").clicked() {
                        let new_name = self.rename_buffer.trim().to_string();
                        self.dispatch(MapCommand::Node(NodeCommand::Rename { node_id, new_name }));
                    }
                });
                if ui.button("Delete location").clicked() {
                    self.selection = None;
                    self.dispatch(MapCommand::Node(NodeCommand::Remove { node_id }));
                }
            }
            PickTarget::Label(node_id) => {
                ui.label("Label");
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.label_buffer);
                    if ui.button("Set text").clicked() {
                        self.dispatch(MapCommand::Label(LabelCommand::SetText {
                            node_id,
                            text: self.label_buffer.clone(),
                        }));
                    }
                });
                if let Ok(label) = map.label(node_id) {
                    let mut font_size = label.font_size;
                    if ui
                        .add(egui::Slider::new(&mut font_size, 0.5..=10.0).text("Font size"))
                        .changed()
                    {
                        self.dispatch(MapCommand::Label(LabelCommand::SetFontSize {
                            node_id,
                            font_size,
                        }));
                    }
                }
            }
            PickTarget::Segment(edge_id, _) => {
                let Ok(conn) = map.connection(edge_id) else {
                    self.selection = None;
                    return;
                };
                ui.label(format!(
                    "Connection ({} cars, {})",
                    conn.length,
                    conn.color.as_str()
                ));
                let mut color = conn.color.clone();
                Self::color_combo(ui, "selected_color", &mut color);
                if color != conn.color {
                    self.dispatch(MapCommand::Connection(ConnectionCommand::Recolor {
                        edge_id,
                        color,
                    }));
                }
                if ui.button("Straighten").clicked() {
                    self.dispatch(MapCommand::Connection(ConnectionCommand::Straighten {
                        edge_id: Some(edge_id),
                    }));
                }
                if ui.button("Delete connection").clicked() {
                    self.selection = None;
                    self.dispatch(MapCommand::Connection(ConnectionCommand::Remove { edge_id }));
                }
            }
        }
    }

    fn layout_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layout");
        if ui.button("Straighten all connections").clicked() {
            self.dispatch(MapCommand::Connection(ConnectionCommand::Straighten {
                edge_id: None,
            }));
        }
        if ui.button("Reset label positions").clicked() {
            self.dispatch(MapCommand::Label(LabelCommand::ResetPositions));
        }
        if ui.button("Repair connections").clicked() {
            self.dispatch(MapCommand::RepairConnections);
        }

        ui.horizontal(|ui| {
            ui.label("Scale");
            ui.add(egui::DragValue::new(&mut self.scale_factor).speed(0.05).range(0.05..=20.0));
            if ui.button("Apply").clicked() {
                self.dispatch(MapCommand::ScalePositions {
                    factor: self.scale_factor,
                });
                self.fit_requested = true;
            }
        });

        ui.label("Optimizer");
        ui.horizontal(|ui| {
            ui.label("Iterations/frame");
            ui.add(egui::DragValue::new(&mut self.iterations_per_frame).range(1..=200));
        });
        ui.add(
            egui::Slider::new(&mut self.simulation.velocity_decay, 0.8..=1.0)
                .text("Velocity decay"),
        );
        ui.add(
            egui::Slider::new(&mut self.simulation.repulsion_strength, 0.0..=10.0)
                .text("Repulsion"),
        );
        ui.add(
            egui::Slider::new(&mut self.simulation.interaction_radius, 1.0..=50.0)
                .text("Interaction radius"),
        );
        let toggle = if self.optimizer_running {
            "Stop optimizer"
        } else {
            "Run optimizer"
        };
        if ui.button(toggle).clicked() {
            self.optimizer_running = !self.optimizer_running;
        }
    }

    fn background_section(&mut self, ui: &mut egui::Ui, map: &MapGraph) {
        ui.heading("Background");
        let Some(background) = map.background() else {
            ui.label("No background image");
            return;
        };
        ui.label(
            background
                .image_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("image"),
        );
        let mut scale = background.scale;
        if ui
            .add(
                egui::Slider::new(&mut scale, 0.001..=1.0)
                    .logarithmic(true)
                    .text("Scale"),
            )
            .changed()
        {
            self.dispatch(MapCommand::Background(BackgroundCommand::SetScale { scale }));
        }
        let mut offset = background.offset;
        ui.horizontal(|ui| {
            ui.label("Offset");
            let x = ui.add(egui::DragValue::new(&mut offset.x).speed(0.5));
            let y = ui.add(egui::DragValue::new(&mut offset.y).speed(0.5));
            if x.changed() || y.changed() {
                self.dispatch(MapCommand::Background(BackgroundCommand::SetOffset {
                    offset,
                }));
            }
        });
        if ui.button("Remove background").clicked() {
            self.dispatch(MapCommand::Background(BackgroundCommand::Clear));
        }
    }

    fn export_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Export");
        ui.horizontal(|ui| {
            ui.label("Width (px)");
            ui.add(egui::DragValue::new(&mut self.export_options.pixel_width).range(100..=20000));
        });
        ui.checkbox(&mut self.export_options.show_labels, "Labels");
        ui.checkbox(&mut self.export_options.show_tasks, "Task overlay");
        ui.checkbox(&mut self.export_options.include_background, "Background");
    }

    pub(super) fn analysis_panel_contents(&mut self, ui: &mut egui::Ui) {
        let Some(map) = self.current_map() else {
            return;
        };
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Summary");
            if let Some(summary) = self.summary.get_summary(&self.map_id) {
                ui.label(format!("Locations: {}", summary.node_count));
                ui.label(format!("Connections: {}", summary.connection_count));
                ui.label(format!("Total rail cars: {}", summary.total_cars));
                ui.label(format!("Tasks: {}", summary.task_count));
            }
            if let Some(average) = analysis::average_task_length(&map) {
                ui.label(format!("Average task length: {average:.1}"));
            }
            ui.separator();

            ui.heading("Distributions");
            ui.label("Node degrees");
            for (degree, count) in analysis::degree_distribution(&map) {
                ui.label(format!("  degree {degree}: {count}"));
            }
            ui.label("Connection lengths");
            for (length, count) in analysis::edge_length_distribution(&map) {
                ui.label(format!("  {length} cars: {count}"));
            }
            ui.label("Colors");
            let mut colors: Vec<_> = analysis::color_distribution(&map).into_iter().collect();
            colors.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
            for (color, usage) in colors {
                ui.label(format!(
                    "  {}: {} connections, {} cars",
                    color.as_str(),
                    usage.connections,
                    usage.cars
                ));
            }
            ui.label("Task lengths");
            for (length, count) in analysis::task_length_distribution(&map) {
                ui.label(format!("  {length} cars: {count}"));
            }
            ui.separator();

            ui.heading("Importance");
            if ui.button("Compute").clicked() {
                let mut rng = rand::rngs::StdRng::from_entropy();
                self.importance = Some(analysis::node_importance(&map, 10, &mut rng));
                self.edge_impacts = Some(analysis::edge_importance(&map));
            }
            if let Some(importance) = &self.importance {
                let mut scored: Vec<_> = map
                    .nodes()
                    .filter_map(|n| importance.get(&n.id).map(|s| (n.name.clone(), *s)))
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1));
                for (name, score) in scored.into_iter().take(10) {
                    ui.label(format!("  {name}: {score:.2}"));
                }
            }
            if let Some(impacts) = &self.edge_impacts {
                ui.label("Critical connections");
                for conn in map.connections() {
                    match impacts.get(&conn.id) {
                        Some(EdgeImpact::DisconnectsTasks(n)) => {
                            let (a, b) = Self::endpoint_names(&map, conn.source, conn.target);
                            ui.label(format!("  {a} – {b}: cuts off {n} task(s)"));
                        }
                        Some(EdgeImpact::LengthIncrease(delta)) => {
                            let (a, b) = Self::endpoint_names(&map, conn.source, conn.target);
                            ui.label(format!("  {a} – {b}: +{delta} cars on detour"));
                        }
                        _ => {}
                    }
                }
            }
        });
    }

    fn endpoint_names(map: &MapGraph, a: NodeId, b: NodeId) -> (String, String) {
        let name = |id| {
            map.node(id)
                .map(|n| n.name.clone())
                .unwrap_or_else(|_| "?".to_string())
        };
        (name(a), name(b))
    }
}
