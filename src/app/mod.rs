//! Desktop editor application
//!
//! Wires the domain into an `eframe` window: a pannable, zoomable canvas in
//! the center, the edit panel on the left, the analysis panel on the right,
//! and a file menu for projects, map definition imports, background images,
//! and PNG export.

mod canvas;
mod drag;
mod panels;

pub use canvas::{Camera, PickIndex, PickTarget, PICK_RADIUS};
pub use drag::{DragState, EditMode};

use crate::{
    aggregate::MapGraph,
    analysis::EdgeImpact,
    commands::{BackgroundCommand, ConnectionCommand, LabelCommand, MapCommand, NodeCommand},
    events::MapDomainEvent,
    export::ExportOptions,
    handlers::{InMemoryMapRepository, MapCommandHandler, MapCommandHandlerImpl, MapRepository},
    io,
    layout::SimulationParams,
    projections::{LocationListProjection, MapProjection, MapSummaryProjection},
    value_objects::RailColor,
    EdgeId, MapId, NodeId,
};
use eframe::egui;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// The editor application state
pub struct EditorApp {
    repository: Arc<InMemoryMapRepository>,
    handler: MapCommandHandlerImpl,
    map_id: MapId,
    simulation: SimulationParams,

    summary: MapSummaryProjection,
    locations: LocationListProjection,

    camera: Camera,
    fit_requested: bool,
    edit_mode: EditMode,
    drag: DragState,
    selection: Option<PickTarget>,
    background_texture: Option<(PathBuf, egui::TextureHandle)>,
    background_failed: Option<PathBuf>,

    project_path: Option<PathBuf>,
    error_message: Option<String>,

    // Edit panel scratch state
    new_location_name: String,
    connection_from: Option<NodeId>,
    connection_to: Option<NodeId>,
    connection_length: u32,
    connection_color: RailColor,
    task_from: Option<NodeId>,
    task_to: Option<NodeId>,
    rename_buffer: String,
    label_buffer: String,
    last_selection: Option<PickTarget>,
    scale_factor: f64,

    // Layout optimizer
    optimizer_running: bool,
    iterations_per_frame: usize,

    // Analysis panel
    show_analysis: bool,
    importance: Option<HashMap<NodeId, f64>>,
    edge_impacts: Option<HashMap<EdgeId, EdgeImpact>>,

    export_options: ExportOptions,
}

impl EditorApp {
    /// Create the app with a fresh, empty map
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let repository = Arc::new(InMemoryMapRepository::new());
        let handler = MapCommandHandlerImpl::new(repository.clone());
        let mut app = Self {
            repository,
            handler,
            map_id: MapId::new(),
            simulation: SimulationParams::default(),
            summary: MapSummaryProjection::new(),
            locations: LocationListProjection::new(),
            camera: Camera::default(),
            fit_requested: false,
            edit_mode: EditMode::MoveNodes,
            drag: DragState::Idle,
            selection: None,
            background_texture: None,
            background_failed: None,
            project_path: None,
            error_message: None,
            new_location_name: String::new(),
            connection_from: None,
            connection_to: None,
            connection_length: 1,
            connection_color: RailColor::default(),
            task_from: None,
            task_to: None,
            rename_buffer: String::new(),
            label_buffer: String::new(),
            last_selection: None,
            scale_factor: 1.0,
            optimizer_running: false,
            iterations_per_frame: 10,
            show_analysis: false,
            importance: None,
            edge_impacts: None,
            export_options: ExportOptions::default(),
        };
        app.dispatch(MapCommand::CreateMap {
            name: "Untitled board".to_string(),
            description: String::new(),
        });
        app
    }

    /// Run a command; successful events feed the projections, failures land
    /// in the error modal.
    fn dispatch(&mut self, command: MapCommand) -> bool {
        match self.handler.handle_command(self.map_id, command) {
            Ok(events) => {
                for event in &events {
                    self.summary.handle_event(event);
                    self.locations.handle_event(event);
                }
                self.invalidate_analysis();
                true
            }
            Err(e) => {
                self.error_message = Some(e.to_string());
                false
            }
        }
    }

    /// Snapshot of the current aggregate
    fn current_map(&self) -> Option<MapGraph> {
        self.repository.load(self.map_id).ok()
    }

    /// Replace the current map wholesale (project load, definition import)
    fn install_map(&mut self, map: MapGraph, simulation: SimulationParams) {
        self.map_id = map.id();
        self.simulation = simulation;
        if let Err(e) = self.repository.save(&map) {
            self.error_message = Some(e.to_string());
            return;
        }
        self.seed_projections(&map);
        self.selection = None;
        self.drag = DragState::Idle;
        self.background_texture = None;
        self.background_failed = None;
        self.fit_requested = true;
        self.invalidate_analysis();
    }

    /// Rebuild the projections from an aggregate snapshot by replaying
    /// synthetic events.
    fn seed_projections(&mut self, map: &MapGraph) {
        use crate::events::{ConnectionAdded, MapCreated, NodeAdded, TaskAdded};

        self.summary.clear();
        self.locations.clear();
        let mut events = vec![MapDomainEvent::MapCreated(MapCreated {
            map_id: map.id(),
            name: map.name().to_string(),
            description: map.description().to_string(),
            created_at: map.created_at(),
        })];
        for node in map.nodes() {
            events.push(MapDomainEvent::NodeAdded(NodeAdded {
                map_id: map.id(),
                node_id: node.id,
                name: node.name.clone(),
                position: node.position,
            }));
        }
        for conn in map.connections() {
            events.push(MapDomainEvent::ConnectionAdded(ConnectionAdded {
                map_id: map.id(),
                edge_id: conn.id,
                source: conn.source,
                target: conn.target,
                length: conn.length,
                color: conn.color.clone(),
                connection_index: conn.connection_index,
            }));
        }
        for task in map.tasks() {
            events.push(MapDomainEvent::TaskAdded(TaskAdded {
                map_id: map.id(),
                task_id: task.id,
                name: task.name.clone(),
                stops: task.stops.clone(),
            }));
        }
        for event in &events {
            self.summary.handle_event(event);
            self.locations.handle_event(event);
        }
    }

    fn invalidate_analysis(&mut self) {
        self.importance = None;
        self.edge_impacts = None;
    }

    // -- file menu actions --

    fn new_project(&mut self) {
        self.map_id = MapId::new();
        self.project_path = None;
        self.summary.clear();
        self.locations.clear();
        self.selection = None;
        self.background_texture = None;
        self.dispatch(MapCommand::CreateMap {
            name: "Untitled board".to_string(),
            description: String::new(),
        });
        self.invalidate_analysis();
    }

    fn open_project(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Map project", &["json"])
            .pick_file()
        else {
            return;
        };
        match io::load_project(&path) {
            Ok((map, simulation)) => {
                self.install_map(map, simulation);
                self.project_path = Some(path);
            }
            Err(e) => self.error_message = Some(e.to_string()),
        }
    }

    fn save_project(&mut self, choose_path: bool) {
        let path = if choose_path || self.project_path.is_none() {
            let Some(path) = rfd::FileDialog::new()
                .add_filter("Map project", &["json"])
                .set_file_name("map_project.json")
                .save_file()
            else {
                return;
            };
            path
        } else {
            match &self.project_path {
                Some(path) => path.clone(),
                None => return,
            }
        };
        let Some(map) = self.current_map() else {
            return;
        };
        match io::save_project(&path, &map, self.simulation) {
            Ok(()) => self.project_path = Some(path),
            Err(e) => self.error_message = Some(e.to_string()),
        }
    }

    /// Import the three definition files: locations, paths, and optionally
    /// tasks.
    fn import_definitions(&mut self) {
        let Some(locations_path) = rfd::FileDialog::new()
            .set_title("Locations file")
            .add_filter("Text", &["txt"])
            .pick_file()
        else {
            return;
        };
        let Some(paths_path) = rfd::FileDialog::new()
            .set_title("Paths file")
            .add_filter("Text", &["txt"])
            .pick_file()
        else {
            return;
        };
        let tasks_path = rfd::FileDialog::new()
            .set_title("Tasks file (optional, cancel to skip)")
            .add_filter("Text", &["txt"])
            .pick_file();

        let result = self.read_definitions(&locations_path, &paths_path, tasks_path.as_deref());
        match result {
            Ok(map) => {
                self.install_map(map, self.simulation);
                self.project_path = None;
            }
            Err(e) => self.error_message = Some(e.to_string()),
        }
    }

    fn read_definitions(
        &self,
        locations_path: &Path,
        paths_path: &Path,
        tasks_path: Option<&Path>,
    ) -> io::MapIoResult<MapGraph> {
        let locations = io::read_locations(locations_path)?;
        let paths = io::read_paths(paths_path)?;
        let tasks = match tasks_path {
            Some(path) => io::read_tasks(path)?,
            None => Vec::new(),
        };
        let name = locations_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Imported board");
        io::assemble_map(name, &locations, &paths, &tasks)
    }

    fn load_background(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        self.background_texture = None;
        self.background_failed = None;
        self.dispatch(MapCommand::Background(BackgroundCommand::Set {
            image_path: path,
        }));
        self.fit_requested = true;
    }

    fn export_png(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name("board.png")
            .save_file()
        else {
            return;
        };
        let Some(map) = self.current_map() else {
            return;
        };
        if let Err(e) = crate::export::export_png(&map, &self.export_options, &path) {
            self.error_message = Some(e.to_string());
        } else {
            info!(path = %path.display(), "board exported");
        }
    }

    // -- canvas --

    /// Load (or reuse) the background texture for the current map
    fn background_texture(
        &mut self,
        ctx: &egui::Context,
        map: &MapGraph,
    ) -> Option<egui::TextureHandle> {
        let background = map.background()?;
        if let Some((path, texture)) = &self.background_texture {
            if *path == background.image_path {
                return Some(texture.clone());
            }
        }
        if self.background_failed.as_deref() == Some(background.image_path.as_path()) {
            return None;
        }
        match image::open(&background.image_path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let size = [rgba.width() as usize, rgba.height() as usize];
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
                let texture =
                    ctx.load_texture("background", color_image, egui::TextureOptions::LINEAR);
                self.background_texture = Some((background.image_path.clone(), texture.clone()));
                Some(texture)
            }
            Err(e) => {
                error!(path = %background.image_path.display(), %e, "cannot load background image");
                self.error_message = Some(format!("Cannot load background image: {e}"));
                self.background_failed = Some(background.image_path.clone());
                None
            }
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let Some(map) = self.current_map() else {
            return;
        };
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;

        if self.fit_requested {
            self.camera.fit(rect, &map);
            self.fit_requested = false;
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                if let Some(pointer) = response.hover_pos() {
                    self.camera.zoom_towards(rect, pointer, (scroll * 0.002).exp());
                }
            }
        }

        let pick_radius = (PICK_RADIUS / self.camera.zoom) as f64;
        if response.drag_started() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let at = self.camera.to_world(rect, pointer);
                let (nodes, labels, segments) = self.edit_mode.picks();
                let index = PickIndex::new(&map, nodes, labels, segments);
                self.drag = DragState::begin(&index, at, pick_radius);
                if let Some(target) = self.drag.target() {
                    self.selection = Some(target);
                }
            }
        }
        if response.dragged() {
            match self.drag {
                DragState::Panning => self.camera.pan(response.drag_delta()),
                DragState::Dragging(target) => {
                    if let Some(pointer) = response.interact_pointer_pos() {
                        let position = self.camera.to_world(rect, pointer);
                        let command = match target {
                            PickTarget::Node(node_id) => {
                                MapCommand::Node(NodeCommand::Move { node_id, position })
                            }
                            PickTarget::Label(node_id) => {
                                MapCommand::Label(LabelCommand::Move { node_id, position })
                            }
                            PickTarget::Segment(edge_id, segment) => {
                                MapCommand::Connection(ConnectionCommand::MoveSegment {
                                    edge_id,
                                    segment,
                                    position,
                                })
                            }
                        };
                        self.dispatch(command);
                    }
                }
                DragState::Idle => {}
            }
        }
        if response.drag_stopped() {
            self.drag = DragState::Idle;
        }
        if response.clicked() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let at = self.camera.to_world(rect, pointer);
                let index = PickIndex::new(&map, true, true, true);
                self.selection = index.pick(at, pick_radius);
            }
        }

        // Repaint with fresh positions after a drag mutation.
        let map = self.current_map().unwrap_or(map);
        let texture = self.background_texture(ui.ctx(), &map);
        painter.rect_filled(rect, 0.0, egui::Color32::from_gray(245));
        canvas::paint_map(
            &painter,
            rect,
            &self.camera,
            &map,
            texture.as_ref(),
            self.selection,
        );
    }

    fn run_optimizer_frame(&mut self, ctx: &egui::Context) {
        if !self.optimizer_running {
            return;
        }
        let Some(mut map) = self.current_map() else {
            self.optimizer_running = false;
            return;
        };
        let result =
            crate::layout::optimize_layout(&mut map, self.simulation, self.iterations_per_frame);
        match result {
            Ok(()) => {
                if let Err(e) = self.repository.save(&map) {
                    self.error_message = Some(e.to_string());
                    self.optimizer_running = false;
                }
            }
            Err(e) => {
                self.error_message = Some(e.to_string());
                self.optimizer_running = false;
            }
        }
        ctx.request_repaint();
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("New").clicked() {
                        ui.close();
                        self.new_project();
                    }
                    if ui.button("Open project…").clicked() {
                        ui.close();
                        self.open_project();
                    }
                    if ui.button("Save project").clicked() {
                        ui.close();
                        self.save_project(false);
                    }
                    if ui.button("Save project as…").clicked() {
                        ui.close();
                        self.save_project(true);
                    }
                    ui.separator();
                    if ui.button("Import map files…").clicked() {
                        ui.close();
                        self.import_definitions();
                    }
                    if ui.button("Load background image…").clicked() {
                        ui.close();
                        self.load_background();
                    }
                    if ui.button("Export PNG…").clicked() {
                        ui.close();
                        self.export_png();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ui.close();
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.button("Fit to map").clicked() {
                        ui.close();
                        self.fit_requested = true;
                    }
                    ui.checkbox(&mut self.show_analysis, "Analysis panel");
                });
            });
        });
    }

    fn error_modal(&mut self, ctx: &egui::Context) {
        if let Some(error) = self.error_message.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(&error);
                    if ui.button("OK").clicked() {
                        self.error_message = None;
                    }
                });
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.run_optimizer_frame(ctx);
        self.menu_bar(ctx);
        egui::SidePanel::left("edit_panel")
            .default_width(260.0)
            .show(ctx, |ui| self.edit_panel_contents(ui));
        if self.show_analysis {
            egui::SidePanel::right("analysis_panel")
                .default_width(280.0)
                .show(ctx, |ui| self.analysis_panel_contents(ui));
        }
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));
        self.error_modal(ctx);
    }
}
