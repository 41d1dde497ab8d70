use crate::{
    Nora,
    backend::{ButtonState, CursorImage, DeviceKind, InputEvent, SeatCapabilities, SurfaceHit},
    utils::{Point, Rectangle},
};

impl Nora {
    pub fn handle_input_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerMotion { time, dx, dy } => {
                self.pointer_location = self.pointer_location + Point::new(dx, dy);
                self.clamp_pointer_location();
                self.handle_pointer_motion(time);
            }
            InputEvent::PointerMotionAbsolute { time, x, y } => {
                let Some(bounds) = self.layout_bounds() else {
                    return;
                };
                self.pointer_location = Point::new(
                    f64::from(bounds.loc.x) + x * f64::from(bounds.size.w),
                    f64::from(bounds.loc.y) + y * f64::from(bounds.size.h),
                );
                self.clamp_pointer_location();
                self.handle_pointer_motion(time);
            }
            InputEvent::PointerButton {
                time,
                button,
                state,
            } => self.handle_pointer_button(time, button, state),
            InputEvent::PointerAxis(frame) => {
                if self.pointer_focus.is_some() {
                    self.backend.pointer_axis(frame);
                }
            }
            InputEvent::PointerFrame => {
                if self.pointer_focus.is_some() {
                    self.backend.pointer_frame();
                }
            }
            InputEvent::KeyboardKey {
                time,
                keycode,
                state,
            } => {
                if self.keyboard_focus.is_some() {
                    self.backend.keyboard_key(time, keycode, state);
                }
            }
            InputEvent::KeyboardModifiers(modifiers) => {
                if self.keyboard_focus.is_some() {
                    self.backend.keyboard_modifiers(modifiers);
                }
            }
            InputEvent::NewDevice { kind } => self.handle_new_device(kind),
        }
    }

    fn handle_pointer_motion(&mut self, time: u32) {
        if self.grab.is_active() {
            let Some(current) = self
                .grab
                .view()
                .and_then(|view| self.views.get(view))
                .map(|view| view.geometry)
            else {
                self.grab.release();
                return;
            };
            if let Some((view, geometry)) = self.grab.motion(self.pointer_location, current) {
                self.apply_geometry(view, geometry);
            }
            return;
        }

        match self.refresh_pointer_focus() {
            Some(hit) => self.backend.pointer_motion(time, hit.local),
            None => self.backend.set_cursor_image(CursorImage::Default),
        }
    }

    /// Hands pointer focus to whatever is under the pointer now, sending
    /// enter or clear only when the focused surface changes.
    pub(crate) fn refresh_pointer_focus(&mut self) -> Option<SurfaceHit> {
        let hit = self
            .tree
            .find_at(self.backend.scene(), self.pointer_location)
            .map(|(_, hit)| hit);
        let Some(hit) = hit else {
            if self.pointer_focus.take().is_some() {
                self.backend.pointer_clear_focus();
            }
            return None;
        };

        if self.pointer_focus != Some(hit.surface) {
            self.pointer_focus = Some(hit.surface);
            self.backend.pointer_enter(hit.surface, hit.local);
        }
        Some(hit)
    }

    fn handle_pointer_button(&mut self, time: u32, button: u32, state: ButtonState) {
        if self.pointer_focus.is_some() {
            self.backend.pointer_button(time, button, state);
        }

        match state {
            ButtonState::Released => {
                if let Some(view) = self.grab.release() {
                    tracing::info!(?view, "interactive grab ended");
                }
            }
            ButtonState::Pressed => {
                if self.grab.is_active() {
                    return;
                }
                let Some(view) = self
                    .tree
                    .find_at(self.backend.scene(), self.pointer_location)
                    .and_then(|(container, _)| self.tree.container(container))
                    .and_then(|node| node.view())
                else {
                    return;
                };
                self.focus_view(view);
            }
        }
    }

    fn handle_new_device(&mut self, kind: DeviceKind) {
        if kind == DeviceKind::Keyboard {
            self.keyboards += 1;
        }

        let mut capabilities = SeatCapabilities::POINTER;
        if self.keyboards > 0 {
            capabilities |= SeatCapabilities::KEYBOARD;
        }
        tracing::info!(?kind, ?capabilities, "new input device");
        self.backend.set_capabilities(capabilities);
    }

    /// Bounding box of every output in the layout.
    fn layout_bounds(&self) -> Option<Rectangle> {
        let mut outputs = self.tree.outputs().map(|(_, node)| node.geometry);
        let first = outputs.next()?;
        let (mut left, mut top, mut right, mut bottom) =
            (first.loc.x, first.loc.y, first.right(), first.bottom());
        for geometry in outputs {
            left = left.min(geometry.loc.x);
            top = top.min(geometry.loc.y);
            right = right.max(geometry.right());
            bottom = bottom.max(geometry.bottom());
        }
        Some(Rectangle::new(left, top, right - left, bottom - top))
    }

    fn clamp_pointer_location(&mut self) {
        let Some(bounds) = self.layout_bounds() else {
            return;
        };
        let (left, top) = (f64::from(bounds.loc.x), f64::from(bounds.loc.y));
        let right = (f64::from(bounds.right()) - 1.0).max(left);
        let bottom = (f64::from(bounds.bottom()) - 1.0).max(top);
        self.pointer_location.x = self.pointer_location.x.clamp(left, right);
        self.pointer_location.y = self.pointer_location.y.clamp(top, bottom);
    }
}
