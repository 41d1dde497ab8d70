use crate::utils::Rectangle;
use crate::view::ViewId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

/// Master/slave bookkeeping of one workspace.
///
/// The first view inserted becomes master, later views queue up in the
/// slave list in insertion order. When the master leaves, the oldest slave
/// takes over.
#[derive(Debug, Default, Clone)]
pub struct MasterStack {
    master: Option<ViewId>,
    slaves: Vec<ViewId>,
}

impl MasterStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn master(&self) -> Option<ViewId> {
        self.master
    }

    pub fn slaves(&self) -> &[ViewId] {
        &self.slaves
    }

    pub fn is_empty(&self) -> bool {
        self.master.is_none() && self.slaves.is_empty()
    }

    pub fn len(&self) -> usize {
        usize::from(self.master.is_some()) + self.slaves.len()
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.master == Some(view) || self.slaves.contains(&view)
    }

    pub fn role_of(&self, view: ViewId) -> Option<Role> {
        if self.master == Some(view) {
            Some(Role::Master)
        } else if self.slaves.contains(&view) {
            Some(Role::Slave)
        } else {
            None
        }
    }

    pub fn insert(&mut self, view: ViewId) -> Role {
        if let Some(role) = self.role_of(view) {
            return role;
        }
        if self.master.is_none() {
            self.master = Some(view);
            Role::Master
        } else {
            self.slaves.push(view);
            Role::Slave
        }
    }

    /// Returns false if `view` was not tiled here.
    pub fn remove(&mut self, view: ViewId) -> bool {
        if self.master == Some(view) {
            self.master = if self.slaves.is_empty() {
                None
            } else {
                Some(self.slaves.remove(0))
            };
            return true;
        }

        let before = self.slaves.len();
        self.slaves.retain(|slave| *slave != view);
        before != self.slaves.len()
    }

    /// Geometry of every tiled view for `area`, master first.
    pub fn arrange(&self, area: Rectangle, border: i32) -> Vec<(ViewId, Rectangle)> {
        let Some(master) = self.master else {
            return Vec::new();
        };

        let Rectangle { loc, size } = area;
        if self.slaves.is_empty() {
            let geometry = Rectangle::new(
                loc.x + border,
                loc.y + border,
                size.w - 2 * border,
                size.h - 2 * border,
            );
            return vec![(master, geometry)];
        }

        let half = size.w / 2;
        let count = self.slaves.len() as i32;
        let slice = size.h / count;

        let mut geometries = Vec::with_capacity(self.len());
        geometries.push((
            master,
            Rectangle::new(loc.x + border, loc.y + border, half - border, size.h - 2 * border),
        ));
        geometries.extend(self.slaves.iter().enumerate().map(|(index, slave)| {
            let geometry = Rectangle::new(
                loc.x + half + border,
                loc.y + slice * index as i32 + border,
                half - 2 * border,
                slice - 2 * border,
            );
            (*slave, geometry)
        }));
        geometries
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use slotmap::SlotMap;

    use super::*;

    fn views(count: usize) -> Vec<ViewId> {
        let mut map = SlotMap::<ViewId, ()>::with_key();
        (0..count).map(|_| map.insert(())).collect()
    }

    const SCREEN: Rectangle = Rectangle::new(0, 0, 1920, 1080);

    #[test]
    fn first_view_is_master_rest_queue_as_slaves() {
        let ids = views(3);
        let mut stack = MasterStack::new();

        assert_eq!(stack.insert(ids[0]), Role::Master);
        assert_eq!(stack.insert(ids[1]), Role::Slave);
        assert_eq!(stack.insert(ids[2]), Role::Slave);
        assert_eq!(stack.insert(ids[1]), Role::Slave);

        assert_eq!(stack.master(), Some(ids[0]));
        assert_eq!(stack.slaves(), &ids[1..]);
    }

    #[test]
    fn removing_master_promotes_oldest_slave() {
        let ids = views(3);
        let mut stack = MasterStack::new();
        for id in &ids {
            stack.insert(*id);
        }

        assert!(stack.remove(ids[0]));

        assert_eq!(stack.master(), Some(ids[1]));
        assert_eq!(stack.slaves(), &[ids[2]]);
    }

    #[test]
    fn removing_last_view_empties_stack() {
        let ids = views(2);
        let mut stack = MasterStack::new();
        stack.insert(ids[0]);

        assert!(!stack.remove(ids[1]));
        assert!(stack.remove(ids[0]));
        assert!(stack.is_empty());
        assert!(stack.arrange(SCREEN, 12).is_empty());
    }

    #[test]
    fn master_never_appears_among_slaves() {
        let ids = views(5);
        let mut stack = MasterStack::new();
        let ops: [(bool, usize); 12] = [
            (true, 0),
            (true, 1),
            (true, 2),
            (false, 0),
            (true, 0),
            (false, 1),
            (true, 3),
            (false, 2),
            (true, 4),
            (false, 3),
            (true, 1),
            (false, 4),
        ];

        for (insert, index) in ops {
            if insert {
                stack.insert(ids[index]);
            } else {
                stack.remove(ids[index]);
            }
            if let Some(master) = stack.master() {
                assert!(!stack.slaves().contains(&master));
            } else {
                assert!(stack.slaves().is_empty());
            }
        }
        assert_eq!(stack.master(), Some(ids[0]));
        assert_eq!(stack.slaves(), &[ids[1]]);
    }

    #[test]
    fn lone_master_fills_area_minus_border() {
        let ids = views(1);
        let mut stack = MasterStack::new();
        stack.insert(ids[0]);

        assert_eq!(
            stack.arrange(SCREEN, 12),
            vec![(ids[0], Rectangle::new(12, 12, 1896, 1056))]
        );
    }

    #[test]
    fn master_and_one_slave_split_screen() {
        let ids = views(2);
        let mut stack = MasterStack::new();
        stack.insert(ids[0]);
        stack.insert(ids[1]);

        assert_eq!(
            stack.arrange(SCREEN, 12),
            vec![
                (ids[0], Rectangle::new(12, 12, 948, 1056)),
                (ids[1], Rectangle::new(972, 12, 936, 1056)),
            ]
        );
    }

    #[test]
    fn slaves_stack_top_to_bottom() {
        let ids = views(3);
        let mut stack = MasterStack::new();
        for id in &ids {
            stack.insert(*id);
        }

        let geometries = stack.arrange(SCREEN, 12);
        assert_eq!(geometries[1], (ids[1], Rectangle::new(972, 12, 936, 516)));
        assert_eq!(geometries[2], (ids[2], Rectangle::new(972, 552, 936, 516)));
    }

    #[test]
    fn arrange_respects_area_origin() {
        let ids = views(2);
        let mut stack = MasterStack::new();
        stack.insert(ids[0]);
        stack.insert(ids[1]);

        let area = Rectangle::new(1920, 30, 1920, 1050);
        assert_eq!(
            stack.arrange(area, 0),
            vec![
                (ids[0], Rectangle::new(1920, 30, 960, 1050)),
                (ids[1], Rectangle::new(2880, 30, 960, 1050)),
            ]
        );
    }
}
