use crate::utils::{Rectangle, Size};
use crate::view::{Anchor, LayerData, ViewId};

/// Space reserved along each output edge by exclusive layer surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExclusiveMargin {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl ExclusiveMargin {
    /// Part of `output` left over for tiled windows.
    pub fn usable_area(&self, output: Rectangle) -> Rectangle {
        Rectangle::new(
            output.loc.x + self.left,
            output.loc.y + self.top,
            (output.size.w - self.left - self.right).max(0),
            (output.size.h - self.top - self.bottom).max(0),
        )
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LayerArrangement {
    pub geometries: Vec<(ViewId, Rectangle)>,
    pub margin: ExclusiveMargin,
}

/// Places layer surfaces on `output`. `layers` must be ordered by priority,
/// most recently added first; each exclusive surface anchored to three edges
/// pushes the ones after it further inwards.
pub fn arrange_layers<'a>(
    output: Rectangle,
    layers: impl IntoIterator<Item = (ViewId, &'a LayerData)>,
) -> LayerArrangement {
    let mut arrangement = LayerArrangement::default();

    for (view, data) in layers {
        match place(output, data, &mut arrangement.margin) {
            Some(geometry) => arrangement.geometries.push((view, geometry)),
            None => {
                tracing::error!(
                    namespace = %data.namespace,
                    anchor = ?data.anchor,
                    "layer surface with impossible anchor combination"
                );
                debug_assert!(false, "impossible anchor combination {:?}", data.anchor);
            }
        }
    }

    arrangement
}

fn place(output: Rectangle, data: &LayerData, margin: &mut ExclusiveMargin) -> Option<Rectangle> {
    let Size { w: out_w, h: out_h } = output.size;
    let ox = output.loc.x;
    let oy = output.loc.y;

    let w = if data.desired_size.w == 0 { out_w } else { data.desired_size.w };
    let h = if data.desired_size.h == 0 { out_h } else { data.desired_size.h };

    let anchor = data.anchor;
    let left = anchor.contains(Anchor::LEFT);
    let right = anchor.contains(Anchor::RIGHT);
    let top = anchor.contains(Anchor::TOP);
    let bottom = anchor.contains(Anchor::BOTTOM);
    let horizontal = left && right;
    let vertical = top && bottom;

    let centered_x = ox + out_w / 2 - w / 2;
    let centered_y = oy + out_h / 2 - h / 2;

    let geometry = match anchor.bits().count_ones() {
        0 => Rectangle::new(centered_x, centered_y, w, h),
        1 if left => Rectangle::new(ox, centered_y, w, h),
        1 if right => Rectangle::new(ox + out_w - w, centered_y, w, h),
        1 if top => Rectangle::new(centered_x, oy, w, h),
        1 if bottom => Rectangle::new(centered_x, oy + out_h - h, w, h),
        2 if horizontal => Rectangle::new(ox, centered_y, out_w, h),
        2 if vertical => Rectangle::new(centered_x, oy, w, out_h),
        2 if top && left => Rectangle::new(ox, oy, w, h),
        2 if top && right => Rectangle::new(ox + out_w - w, oy, w, h),
        2 if bottom && right => Rectangle::new(ox + out_w - w, oy + out_h - h, w, h),
        2 if bottom && left => Rectangle::new(ox, oy + out_h - h, w, h),
        3 if horizontal && top => {
            let geometry = Rectangle::new(ox, oy + margin.top, out_w, h);
            if data.exclusive_zone != 0 {
                margin.top += h;
            }
            geometry
        }
        3 if horizontal => {
            let geometry = Rectangle::new(ox, oy + out_h - h - margin.bottom, out_w, h);
            if data.exclusive_zone != 0 {
                margin.bottom += h;
            }
            geometry
        }
        3 if vertical && left => {
            let geometry = Rectangle::new(ox + margin.left, oy, w, out_h);
            if data.exclusive_zone != 0 {
                margin.left += w;
            }
            geometry
        }
        3 if vertical && right => {
            let geometry = Rectangle::new(ox + out_w - w - margin.right, oy, w, out_h);
            if data.exclusive_zone != 0 {
                margin.right += w;
            }
            geometry
        }
        4 => output,
        _ => return None,
    };

    Some(geometry)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use slotmap::SlotMap;

    use super::*;
    use crate::view::Layer;

    const OUTPUT: Rectangle = Rectangle::new(0, 0, 1920, 1080);

    fn layer(anchor: Anchor, w: i32, h: i32, exclusive_zone: i32) -> LayerData {
        LayerData {
            namespace: "test".to_owned(),
            layer: Layer::Top,
            anchor,
            desired_size: Size::new(w, h),
            exclusive_zone,
        }
    }

    fn single(output: Rectangle, data: &LayerData) -> Rectangle {
        let mut map = SlotMap::<ViewId, ()>::with_key();
        let id = map.insert(());
        let arrangement = arrange_layers(output, [(id, data)]);
        arrangement.geometries[0].1
    }

    #[test]
    fn four_anchors_fill_output_regardless_of_size() {
        let data = layer(Anchor::all(), 300, 40, 0);
        assert_eq!(single(OUTPUT, &data), Rectangle::new(0, 0, 1920, 1080));

        let data = layer(Anchor::all(), 0, 0, 10);
        assert_eq!(single(OUTPUT, &data), OUTPUT);
    }

    #[test]
    fn unanchored_is_centered() {
        let data = layer(Anchor::empty(), 400, 200, 0);
        assert_eq!(single(OUTPUT, &data), Rectangle::new(760, 440, 400, 200));

        let data = layer(Anchor::empty(), 0, 200, 0);
        assert_eq!(single(OUTPUT, &data), Rectangle::new(0, 440, 1920, 200));
    }

    #[test]
    fn single_anchor_sits_on_edge() {
        let data = layer(Anchor::RIGHT, 100, 200, 0);
        assert_eq!(single(OUTPUT, &data), Rectangle::new(1820, 440, 100, 200));

        let data = layer(Anchor::BOTTOM, 400, 30, 0);
        assert_eq!(single(OUTPUT, &data), Rectangle::new(760, 1050, 400, 30));
    }

    #[test]
    fn opposite_pair_stretches_and_corner_pair_tucks_in() {
        let data = layer(Anchor::LEFT | Anchor::RIGHT, 400, 30, 0);
        assert_eq!(single(OUTPUT, &data), Rectangle::new(0, 525, 1920, 30));

        let data = layer(Anchor::TOP | Anchor::BOTTOM, 50, 300, 0);
        assert_eq!(single(OUTPUT, &data), Rectangle::new(935, 0, 50, 1080));

        let data = layer(Anchor::BOTTOM | Anchor::RIGHT, 200, 100, 0);
        assert_eq!(single(OUTPUT, &data), Rectangle::new(1720, 980, 200, 100));
    }

    #[test]
    fn exclusive_bars_stack_outward() {
        let mut map = SlotMap::<ViewId, ()>::with_key();
        let newest = map.insert(());
        let older = map.insert(());
        let side = map.insert(());

        let bar = layer(Anchor::LEFT | Anchor::RIGHT | Anchor::TOP, 0, 30, 30);
        let second = layer(Anchor::LEFT | Anchor::RIGHT | Anchor::TOP, 0, 20, 20);
        let dock = layer(Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT, 64, 0, 64);

        let arrangement =
            arrange_layers(OUTPUT, [(newest, &bar), (older, &second), (side, &dock)]);

        assert_eq!(
            arrangement.geometries,
            vec![
                (newest, Rectangle::new(0, 0, 1920, 30)),
                (older, Rectangle::new(0, 30, 1920, 20)),
                (side, Rectangle::new(0, 0, 64, 1080)),
            ]
        );
        assert_eq!(
            arrangement.margin,
            ExclusiveMargin {
                left: 64,
                right: 0,
                top: 50,
                bottom: 0,
            }
        );
        assert_eq!(
            arrangement.margin.usable_area(OUTPUT),
            Rectangle::new(64, 50, 1856, 1030)
        );
    }

    #[test]
    fn non_exclusive_bar_reserves_nothing() {
        let data = layer(Anchor::LEFT | Anchor::RIGHT | Anchor::BOTTOM, 0, 40, 0);
        let mut map = SlotMap::<ViewId, ()>::with_key();
        let id = map.insert(());

        let arrangement = arrange_layers(OUTPUT, [(id, &data)]);

        assert_eq!(arrangement.geometries[0].1, Rectangle::new(0, 1040, 1920, 40));
        assert_eq!(arrangement.margin, ExclusiveMargin::default());
    }

    #[test]
    fn placement_follows_output_origin() {
        let output = Rectangle::new(1920, 0, 1280, 720);
        let data = layer(Anchor::all(), 0, 0, 0);
        assert_eq!(single(output, &data), output);

        let data = layer(Anchor::TOP | Anchor::RIGHT, 100, 50, 0);
        assert_eq!(single(output, &data), Rectangle::new(3100, 0, 100, 50));
    }
}
