// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Map canvas: tiles, airports, flights and the selected flight's track.

use egui::{Color32, FontId, Pos2, Rect, Sense, Shape, Stroke, Vec2};
use flight_track::geo::ICON_HEADING_OFFSET_DEG;
use flight_track::{Coordinate, FlightController, MarkerId};

use super::markers::MarkerLayer;
use super::tiles::{TileManager, WebMercator, MAX_ZOOM, MIN_ZOOM, TILE_SIZE};

const FLIGHT_HIT_RADIUS: f32 = 14.0;
const AIRPORT_HOVER_RADIUS: f32 = 10.0;
const GLYPH_LENGTH: f32 = 18.0;

/// Native nose direction of the airplane glyph, clockwise from north.
const GLYPH_NATIVE_HEADING_DEG: f64 = -ICON_HEADING_OFFSET_DEG;

const ROUTE_COLOR: Color32 = Color32::from_rgba_premultiplied(204, 0, 0, 204);
const TRACK_COLOR: Color32 = Color32::from_rgb(255, 200, 50);
const PROJECTED_COLOR: Color32 = Color32::from_rgb(80, 200, 255);
const PLANE_COLOR: Color32 = Color32::from_rgb(30, 30, 30);
const SELECTED_PLANE_COLOR: Color32 = Color32::from_rgb(220, 40, 40);
const AIRPORT_COLOR: Color32 = Color32::from_rgb(40, 90, 200);

/// Screen placement of the map for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    screen_center: Pos2,
    tile_zoom: u8,
    tile_px: f64,
    center_x: f64,
    center_y: f64,
}

impl Projection {
    pub fn new(screen_center: Pos2, center: Coordinate, zoom: f32) -> Self {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "zoom is clamped"
        )]
        let tile_zoom = zoom.round().clamp(f32::from(MIN_ZOOM), f32::from(MAX_ZOOM)) as u8;
        let scale = 2_f64.powf(f64::from(zoom) - f64::from(tile_zoom));

        Self {
            screen_center,
            tile_zoom,
            tile_px: f64::from(TILE_SIZE) * scale,
            center_x: WebMercator::lon_to_x(center.lng, tile_zoom),
            center_y: WebMercator::lat_to_y(center.lat, tile_zoom),
        }
    }

    #[allow(clippy::cast_possible_truncation, reason = "screen pixels fit in f32")]
    pub fn to_screen(&self, c: Coordinate) -> Pos2 {
        let x = (WebMercator::lon_to_x(c.lng, self.tile_zoom) - self.center_x) * self.tile_px;
        let y = (WebMercator::lat_to_y(c.lat, self.tile_zoom) - self.center_y) * self.tile_px;
        Pos2::new(self.screen_center.x + x as f32, self.screen_center.y + y as f32)
    }

    pub fn to_coordinate(&self, p: Pos2) -> Coordinate {
        let x = self.center_x + f64::from(p.x - self.screen_center.x) / self.tile_px;
        let y = self.center_y + f64::from(p.y - self.screen_center.y) / self.tile_px;
        Coordinate::new(
            WebMercator::y_to_lat(y, self.tile_zoom),
            WebMercator::x_to_lon(x, self.tile_zoom),
        )
    }
}

/// What the user did on the map this frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MapResponse {
    pub clicked_marker: Option<MarkerId>,
    pub clicked_empty: bool,
}

#[derive(Debug)]
pub struct MapView {
    center: Coordinate,
    zoom: f32,
    tiles: TileManager,
    tile_status: Option<String>,
}

impl MapView {
    pub fn new(center: Coordinate, zoom: f32) -> Self {
        Self {
            center,
            zoom: zoom.clamp(f32::from(MIN_ZOOM), f32::from(MAX_ZOOM)),
            tiles: TileManager::new(),
            tile_status: None,
        }
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn tile_status(&self) -> Option<&str> {
        self.tile_status.as_deref()
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        controller: &FlightController,
        layer: &MarkerLayer,
        show_airports: bool,
    ) -> MapResponse {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        painter.rect_filled(rect, 0.0, Color32::from_rgb(170, 211, 223));

        self.handle_zoom(ui, &response);
        let projection = Projection::new(rect.center(), self.center, self.zoom);

        if response.dragged() {
            let dragged_to = projection.to_coordinate(rect.center() - response.drag_delta());
            self.center = Coordinate::new(dragged_to.lat.clamp(-85.0, 85.0), dragged_to.lng);
        }

        self.draw_tiles(ui, &painter, rect, &projection);

        let selected_id = controller.selected().and_then(|r| controller.cache().marker_id(r.id));
        let pointer = response.hover_pos();

        if show_airports {
            draw_airports(&painter, controller, &projection, pointer);
        }
        draw_routes(&painter, layer, &projection);
        if let Some(track) = controller.selected_track() {
            draw_track(&painter, &track.history, &track.projected, &projection);
        }
        for (id, marker) in layer.iter() {
            let color = if Some(id) == selected_id {
                SELECTED_PLANE_COLOR
            } else {
                PLANE_COLOR
            };
            draw_plane(&painter, projection.to_screen(marker.position), marker.rotation, color);
        }

        let project = |c: Coordinate| projection.to_screen(c);
        if let Some(hovered) = pointer.and_then(|p| layer.hit_test(project, p, FLIGHT_HIT_RADIUS)) {
            if let Some(marker) = layer.get(hovered) {
                let anchor = projection.to_screen(marker.position) + Vec2::new(0.0, -8.0);
                draw_popup(&painter, anchor, &marker.popup_text());
            }
        }

        let mut map_response = MapResponse::default();
        if response.clicked() {
            let hit = response
                .interact_pointer_pos()
                .and_then(|p| layer.hit_test(project, p, FLIGHT_HIT_RADIUS));
            match hit {
                Some(id) => map_response.clicked_marker = Some(id),
                None => map_response.clicked_empty = true,
            }
        }

        painter.text(
            rect.right_bottom() + Vec2::new(-6.0, -6.0),
            egui::Align2::RIGHT_BOTTOM,
            "© OpenStreetMap contributors",
            FontId::proportional(10.0),
            Color32::from_black_alpha(180),
        );

        map_response
    }

    fn handle_zoom(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let (zoom_delta, scroll) = ui.ctx().input(|i| (i.zoom_delta(), i.smooth_scroll_delta.y));
        let mut change = 0.0;
        if (zoom_delta - 1.0).abs() > 0.001 {
            change += zoom_delta.log2();
        }
        if response.hovered() && scroll.abs() > 0.0 {
            change += scroll / 200.0;
        }
        if change != 0.0 {
            self.zoom = (self.zoom + change).clamp(f32::from(MIN_ZOOM), f32::from(MAX_ZOOM));
        }
    }

    fn draw_tiles(
        &mut self,
        ui: &egui::Ui,
        painter: &egui::Painter,
        rect: Rect,
        projection: &Projection,
    ) {
        #[allow(clippy::cast_possible_truncation, reason = "tile size fits in f32")]
        let tile_px = projection.tile_px as f32;
        let scale = tile_px / TILE_SIZE;

        let visible = TileManager::get_visible_tiles(
            self.center.lat,
            self.center.lng,
            projection.tile_zoom,
            rect.width() / scale,
            rect.height() / scale,
        );

        let mut rendered = 0;
        for placed in visible {
            let Some(texture) = self.tiles.get_tile(placed.coord, ui.ctx()) else {
                continue;
            };
            let min = rect.center() + Vec2::new(placed.offset_x, placed.offset_y) * scale;
            painter.image(
                texture.id(),
                Rect::from_min_size(min, Vec2::splat(tile_px)),
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
            rendered += 1;
        }

        let errors = self.tiles.get_error_count();
        self.tile_status = if errors > 0 {
            Some(format!("Failed to load {errors} tiles"))
        } else if self.tiles.has_loading_tiles() {
            Some("Loading map tiles...".to_string())
        } else if rendered > 0 {
            None
        } else {
            self.tile_status.take()
        };
    }
}

fn draw_airports(
    painter: &egui::Painter,
    controller: &FlightController,
    projection: &Projection,
    pointer: Option<Pos2>,
) {
    let clip = painter.clip_rect().expand(20.0);
    for airport in controller.airports() {
        let pos = projection.to_screen(airport.coordinate);
        if !clip.contains(pos) {
            continue;
        }
        // Pin: stem anchored at the airport, head above it
        painter.line_segment([pos, pos + Vec2::new(0.0, -10.0)], Stroke::new(2.0, AIRPORT_COLOR));
        painter.circle_filled(pos + Vec2::new(0.0, -12.0), 5.0, AIRPORT_COLOR);
        painter.circle_filled(pos + Vec2::new(0.0, -12.0), 2.0, Color32::WHITE);

        let pin = pos + Vec2::new(0.0, -10.0);
        if pointer.is_some_and(|p| p.distance(pin) <= AIRPORT_HOVER_RADIUS) {
            draw_popup(painter, pos + Vec2::new(0.0, -33.0), &airport.name);
        }
    }
}

/// Flown leg (solid) and remaining leg (dashed) for every flight.
fn draw_routes(painter: &egui::Painter, layer: &MarkerLayer, projection: &Projection) {
    for (_, marker) in layer.iter() {
        let start = projection.to_screen(marker.start);
        let pos = projection.to_screen(marker.position);
        let end = projection.to_screen(marker.end);

        painter.line_segment([start, pos], Stroke::new(3.0, ROUTE_COLOR));
        painter.extend(Shape::dashed_line(&[pos, end], Stroke::new(2.0, ROUTE_COLOR), 4.0, 4.0));
    }
}

fn draw_track(
    painter: &egui::Painter,
    history: &[Coordinate],
    projected: &[Coordinate],
    projection: &Projection,
) {
    if history.len() >= 2 {
        let points: Vec<Pos2> = history.iter().map(|c| projection.to_screen(*c)).collect();
        painter.add(Shape::line(points, Stroke::new(3.0, TRACK_COLOR)));
    }
    if projected.len() >= 2 {
        let points: Vec<Pos2> = projected.iter().map(|c| projection.to_screen(*c)).collect();
        painter.extend(Shape::dashed_line(&points, Stroke::new(2.0, PROJECTED_COLOR), 6.0, 4.0));
    }
}

/// Glyph outline in native orientation, nose along +Y before rotation.
fn glyph_points(center: Pos2, rotation: f64) -> Vec<Pos2> {
    let heading = (rotation + GLYPH_NATIVE_HEADING_DEG).to_radians();
    #[allow(clippy::cast_possible_truncation, reason = "unit vector components")]
    let (sin, cos) = (heading.sin() as f32, heading.cos() as f32);

    // Screen space: north is up (-y), angles grow clockwise
    let forward = Vec2::new(sin, -cos);
    let right = Vec2::new(cos, sin);
    let half = GLYPH_LENGTH / 2.0;

    vec![
        center + forward * half,
        center - forward * half * 0.6 + right * half * 0.7,
        center - forward * half * 0.3,
        center - forward * half * 0.6 - right * half * 0.7,
    ]
}

fn draw_plane(painter: &egui::Painter, pos: Pos2, rotation: f64, color: Color32) {
    let points = glyph_points(pos, rotation);
    // Split the arrowhead into two convex halves around the tail notch
    painter.add(Shape::convex_polygon(
        vec![points[0], points[1], points[2]],
        color,
        Stroke::new(1.0, Color32::WHITE),
    ));
    painter.add(Shape::convex_polygon(
        vec![points[0], points[2], points[3]],
        color,
        Stroke::new(1.0, Color32::WHITE),
    ));
}

fn draw_popup(painter: &egui::Painter, anchor: Pos2, text: &str) {
    let galley =
        painter.layout_no_wrap(text.to_string(), FontId::proportional(11.0), Color32::WHITE);
    let padding = Vec2::new(5.0, 3.0);
    let size = galley.size() + padding * 2.0;
    let rect = Rect::from_min_size(anchor - Vec2::new(size.x / 2.0, size.y), size);

    painter.rect_filled(rect, 3.0, Color32::from_rgba_unmultiplied(0, 0, 0, 200));
    painter.galley(rect.min + padding, galley, Color32::WHITE);
}
