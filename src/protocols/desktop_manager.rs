//! Server side of the desktop management protocol.
//!
//! A management client (task bar, switcher, ...) binds the global and gets
//! one `view` object per window. Every window has exactly one handle here,
//! and each handle keeps one resource per bound client, so metadata changes
//! fan out to every bound client and a window going away tears all of them
//! down in one go.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use crate::utils::ClientId;
use crate::view::ViewId;

new_key_type! {
    pub struct ViewHandleId;
}

/// Wire-level object id allocated by the protocol transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Toplevel,
    Popup,
    Layer,
}

/// Events the server emits on manager and view resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ManagerEvent {
    /// Sent on a manager resource to announce a new view resource.
    View { view: ResourceId },
    Title { title: String },
    AppId { app_id: String },
    Kind { kind: HandleKind },
    Hidden { hidden: bool },
    Destroy,
}

/// Requests a management client can send on a view resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewRequest {
    Hide,
}

/// Wire collaborator: allocates resources and delivers events.
pub trait ManagerTransport {
    /// Creates a view resource owned by `client`, child of `manager`.
    /// `None` means the allocation failed.
    fn create_view_resource(&mut self, client: ClientId, manager: ResourceId)
    -> Option<ResourceId>;
    fn send(&mut self, resource: ResourceId, event: ManagerEvent);
    fn post_no_memory(&mut self, client: ClientId);
    fn release(&mut self, resource: ResourceId);
}

pub trait DesktopManagerHandler {
    fn desktop_manager_state(&mut self) -> &mut DesktopManagerState;
    fn hide_requested(&mut self, view: ViewId);
}

#[derive(Debug)]
struct ViewHandleData {
    view: ViewId,
    kind: HandleKind,
    title: Option<String>,
    app_id: Option<String>,
    hidden: bool,
    resources: BTreeMap<ClientId, ResourceId>,
}

pub struct DesktopManagerState {
    transport: Box<dyn ManagerTransport>,
    instances: BTreeMap<ClientId, ResourceId>,
    handles: SlotMap<ViewHandleId, ViewHandleData>,
    order: Vec<ViewHandleId>,
    sync_existing: bool,
}

impl DesktopManagerState {
    pub fn new(transport: Box<dyn ManagerTransport>, sync_existing: bool) -> Self {
        Self {
            transport,
            instances: BTreeMap::new(),
            handles: SlotMap::with_key(),
            order: Vec::new(),
            sync_existing,
        }
    }

    pub fn set_sync_existing(&mut self, sync_existing: bool) {
        self.sync_existing = sync_existing;
    }

    pub fn bound_clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.instances.keys().copied()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn view_of(&self, handle: ViewHandleId) -> Option<ViewId> {
        self.handles.get(handle).map(|data| data.view)
    }

    pub fn is_hidden(&self, handle: ViewHandleId) -> bool {
        self.handles.get(handle).is_some_and(|data| data.hidden)
    }

    pub fn resource_for(&self, handle: ViewHandleId, client: ClientId) -> Option<ResourceId> {
        self.handles
            .get(handle)
            .and_then(|data| data.resources.get(&client).copied())
    }

    /// A client bound the global and got `manager`.
    pub fn bind(&mut self, client: ClientId, manager: ResourceId) {
        if let Some(previous) = self.instances.insert(client, manager) {
            tracing::warn!(?client, ?previous, "client bound desktop manager twice, replacing");
            self.release_client_views(client);
            self.transport.release(previous);
        }
        tracing::info!(?client, ?manager, "desktop manager client bound");

        if !self.sync_existing {
            return;
        }
        for handle in self.order.clone() {
            let Some(data) = self.handles.get_mut(handle) else {
                continue;
            };
            announce(self.transport.as_mut(), data, client, manager);
        }
    }

    pub fn create_handle(&mut self, view: ViewId, kind: HandleKind) -> ViewHandleId {
        let mut data = ViewHandleData {
            view,
            kind,
            title: None,
            app_id: None,
            hidden: false,
            resources: BTreeMap::new(),
        };
        for (client, manager) in &self.instances {
            announce(self.transport.as_mut(), &mut data, *client, *manager);
        }

        let handle = self.handles.insert(data);
        self.order.push(handle);
        tracing::debug!(?view, ?handle, ?kind, "created view handle");
        handle
    }

    pub fn set_title(&mut self, handle: ViewHandleId, title: &str) {
        let Some(data) = self.handles.get_mut(handle) else {
            return;
        };
        data.title = Some(title.to_owned());
        for resource in data.resources.values() {
            self.transport.send(
                *resource,
                ManagerEvent::Title {
                    title: title.to_owned(),
                },
            );
        }
    }

    pub fn set_app_id(&mut self, handle: ViewHandleId, app_id: &str) {
        let Some(data) = self.handles.get_mut(handle) else {
            return;
        };
        data.app_id = Some(app_id.to_owned());
        for resource in data.resources.values() {
            self.transport.send(
                *resource,
                ManagerEvent::AppId {
                    app_id: app_id.to_owned(),
                },
            );
        }
    }

    /// Records the hidden flag; events go out only when it changes.
    pub fn set_hidden(&mut self, handle: ViewHandleId, hidden: bool) {
        let Some(data) = self.handles.get_mut(handle) else {
            return;
        };
        if data.hidden == hidden {
            return;
        }
        data.hidden = hidden;
        for resource in data.resources.values() {
            self.transport.send(*resource, ManagerEvent::Hidden { hidden });
        }
    }

    /// Sends `destroy` on every resource of the handle and releases them.
    pub fn destroy_handle(&mut self, handle: ViewHandleId) {
        let Some(data) = self.handles.remove(handle) else {
            return;
        };
        self.order.retain(|id| *id != handle);
        for resource in data.resources.into_values() {
            self.transport.send(resource, ManagerEvent::Destroy);
            self.transport.release(resource);
        }
        tracing::debug!(view = ?data.view, ?handle, "destroyed view handle");
    }

    /// The client destroyed one of its view resources.
    pub fn view_resource_destroyed(&mut self, client: ClientId, resource: ResourceId) {
        for data in self.handles.values_mut() {
            data.resources
                .retain(|owner, id| !(*owner == client && *id == resource));
        }
    }

    pub fn manager_destroyed(&mut self, client: ClientId, manager: ResourceId) {
        if self.instances.get(&client) == Some(&manager) {
            self.instances.remove(&client);
            self.release_client_views(client);
        }
    }

    pub fn client_disconnected(&mut self, client: ClientId) {
        if let Some(manager) = self.instances.remove(&client) {
            tracing::info!(?client, ?manager, "desktop manager client went away");
        }
        for data in self.handles.values_mut() {
            data.resources.remove(&client);
        }
    }

    fn release_client_views(&mut self, client: ClientId) {
        for data in self.handles.values_mut() {
            if let Some(resource) = data.resources.remove(&client) {
                self.transport.release(resource);
            }
        }
    }

    fn handle_for_resource(&self, client: ClientId, resource: ResourceId) -> Option<ViewHandleId> {
        self.handles
            .iter()
            .find(|(_, data)| data.resources.get(&client) == Some(&resource))
            .map(|(handle, _)| handle)
    }

    /// Routes a request received on a view resource.
    pub fn request<D: DesktopManagerHandler>(
        state: &mut D,
        client: ClientId,
        resource: ResourceId,
        request: ViewRequest,
    ) {
        let protocol_state = state.desktop_manager_state();
        let Some(handle) = protocol_state.handle_for_resource(client, resource) else {
            tracing::debug!(?client, ?resource, "request on unknown view resource");
            return;
        };
        let Some(view) = protocol_state.view_of(handle) else {
            return;
        };

        match request {
            ViewRequest::Hide => {
                tracing::info!(?client, ?view, "received hide request");
                state.hide_requested(view);
            }
        }
    }
}

fn announce(
    transport: &mut dyn ManagerTransport,
    data: &mut ViewHandleData,
    client: ClientId,
    manager: ResourceId,
) {
    let Some(resource) = transport.create_view_resource(client, manager) else {
        tracing::warn!(?client, view = ?data.view, "failed to allocate view resource");
        transport.post_no_memory(client);
        return;
    };

    transport.send(manager, ManagerEvent::View { view: resource });
    transport.send(resource, ManagerEvent::Kind { kind: data.kind });
    if let Some(title) = &data.title {
        transport.send(
            resource,
            ManagerEvent::Title {
                title: title.clone(),
            },
        );
    }
    if let Some(app_id) = &data.app_id {
        transport.send(
            resource,
            ManagerEvent::AppId {
                app_id: app_id.clone(),
            },
        );
    }
    if data.hidden {
        transport.send(resource, ManagerEvent::Hidden { hidden: true });
    }
    data.resources.insert(client, resource);
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Created(ClientId, ResourceId),
        Send(ResourceId, ManagerEvent),
        NoMemory(ClientId),
        Release(ResourceId),
    }

    #[derive(Default)]
    struct Recording {
        calls: Vec<Call>,
        next: u64,
        exhausted: HashSet<ClientId>,
    }

    #[derive(Clone, Default)]
    struct RecordingTransport(Rc<RefCell<Recording>>);

    impl ManagerTransport for RecordingTransport {
        fn create_view_resource(
            &mut self,
            client: ClientId,
            _manager: ResourceId,
        ) -> Option<ResourceId> {
            let mut inner = self.0.borrow_mut();
            if inner.exhausted.contains(&client) {
                return None;
            }
            inner.next += 1;
            let resource = ResourceId(1000 + inner.next);
            inner.calls.push(Call::Created(client, resource));
            Some(resource)
        }

        fn send(&mut self, resource: ResourceId, event: ManagerEvent) {
            self.0.borrow_mut().calls.push(Call::Send(resource, event));
        }

        fn post_no_memory(&mut self, client: ClientId) {
            self.0.borrow_mut().calls.push(Call::NoMemory(client));
        }

        fn release(&mut self, resource: ResourceId) {
            self.0.borrow_mut().calls.push(Call::Release(resource));
        }
    }

    impl RecordingTransport {
        fn take(&self) -> Vec<Call> {
            std::mem::take(&mut self.0.borrow_mut().calls)
        }

        fn events_for(calls: &[Call], resource: ResourceId) -> Vec<ManagerEvent> {
            calls
                .iter()
                .filter_map(|call| match call {
                    Call::Send(target, event) if *target == resource => Some(event.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    fn views(count: usize) -> Vec<ViewId> {
        let mut map = SlotMap::<ViewId, ()>::with_key();
        (0..count).map(|_| map.insert(())).collect()
    }

    const A: ClientId = ClientId(1);
    const B: ClientId = ClientId(2);

    #[test]
    fn new_view_is_announced_to_every_bound_client() {
        let transport = RecordingTransport::default();
        let mut state = DesktopManagerState::new(Box::new(transport.clone()), true);
        state.bind(A, ResourceId(10));
        state.bind(B, ResourceId(20));

        let view = views(1)[0];
        let handle = state.create_handle(view, HandleKind::Toplevel);

        let calls = transport.take();
        let res_a = state.resource_for(handle, A).unwrap();
        let res_b = state.resource_for(handle, B).unwrap();
        assert_ne!(res_a, res_b);
        assert_eq!(
            RecordingTransport::events_for(&calls, ResourceId(10)),
            vec![ManagerEvent::View { view: res_a }]
        );
        assert_eq!(
            RecordingTransport::events_for(&calls, ResourceId(20)),
            vec![ManagerEvent::View { view: res_b }]
        );
        assert_eq!(
            RecordingTransport::events_for(&calls, res_a),
            vec![ManagerEvent::Kind {
                kind: HandleKind::Toplevel
            }]
        );
    }

    #[test]
    fn title_fans_out_to_all_resources() {
        let transport = RecordingTransport::default();
        let mut state = DesktopManagerState::new(Box::new(transport.clone()), true);
        state.bind(A, ResourceId(10));
        state.bind(B, ResourceId(20));
        let handle = state.create_handle(views(1)[0], HandleKind::Toplevel);
        transport.take();

        state.set_title(handle, "X");

        let calls = transport.take();
        for client in [A, B] {
            let resource = state.resource_for(handle, client).unwrap();
            assert_eq!(
                RecordingTransport::events_for(&calls, resource),
                vec![ManagerEvent::Title {
                    title: "X".to_owned()
                }]
            );
        }
    }

    #[test]
    fn late_binder_receives_backlog() {
        let transport = RecordingTransport::default();
        let mut state = DesktopManagerState::new(Box::new(transport.clone()), true);
        let ids = views(2);
        let first = state.create_handle(ids[0], HandleKind::Toplevel);
        let second = state.create_handle(ids[1], HandleKind::Layer);
        state.set_title(first, "term");
        state.set_app_id(first, "foot");
        assert!(transport.take().is_empty());

        state.bind(A, ResourceId(10));

        let calls = transport.take();
        let res_first = state.resource_for(first, A).unwrap();
        let res_second = state.resource_for(second, A).unwrap();
        assert_eq!(
            RecordingTransport::events_for(&calls, ResourceId(10)),
            vec![
                ManagerEvent::View { view: res_first },
                ManagerEvent::View { view: res_second },
            ]
        );
        assert_eq!(
            RecordingTransport::events_for(&calls, res_first),
            vec![
                ManagerEvent::Kind {
                    kind: HandleKind::Toplevel
                },
                ManagerEvent::Title {
                    title: "term".to_owned()
                },
                ManagerEvent::AppId {
                    app_id: "foot".to_owned()
                },
            ]
        );
    }

    #[test]
    fn backlog_can_be_disabled() {
        let transport = RecordingTransport::default();
        let mut state = DesktopManagerState::new(Box::new(transport.clone()), false);
        let handle = state.create_handle(views(1)[0], HandleKind::Toplevel);

        state.bind(A, ResourceId(10));

        assert!(transport.take().is_empty());
        assert_eq!(state.resource_for(handle, A), None);
    }

    #[test]
    fn allocation_failure_only_affects_that_client() {
        let transport = RecordingTransport::default();
        let mut state = DesktopManagerState::new(Box::new(transport.clone()), true);
        state.bind(A, ResourceId(10));
        state.bind(B, ResourceId(20));
        transport.0.borrow_mut().exhausted.insert(A);

        let handle = state.create_handle(views(1)[0], HandleKind::Popup);

        let calls = transport.take();
        assert!(calls.contains(&Call::NoMemory(A)));
        assert!(!calls.contains(&Call::NoMemory(B)));
        assert_eq!(state.resource_for(handle, A), None);
        assert!(state.resource_for(handle, B).is_some());
    }

    #[test]
    fn destroy_notifies_and_releases_every_resource() {
        let transport = RecordingTransport::default();
        let mut state = DesktopManagerState::new(Box::new(transport.clone()), true);
        state.bind(A, ResourceId(10));
        state.bind(B, ResourceId(20));
        let handle = state.create_handle(views(1)[0], HandleKind::Toplevel);
        let res_a = state.resource_for(handle, A).unwrap();
        let res_b = state.resource_for(handle, B).unwrap();
        transport.take();

        state.destroy_handle(handle);

        assert_eq!(
            transport.take(),
            vec![
                Call::Send(res_a, ManagerEvent::Destroy),
                Call::Release(res_a),
                Call::Send(res_b, ManagerEvent::Destroy),
                Call::Release(res_b),
            ]
        );
        assert_eq!(state.handle_count(), 0);

        state.set_title(handle, "gone");
        assert!(transport.take().is_empty());
    }

    #[test]
    fn disconnected_client_stops_receiving_events() {
        let transport = RecordingTransport::default();
        let mut state = DesktopManagerState::new(Box::new(transport.clone()), true);
        state.bind(A, ResourceId(10));
        state.bind(B, ResourceId(20));
        let handle = state.create_handle(views(1)[0], HandleKind::Toplevel);
        let res_b = state.resource_for(handle, B).unwrap();

        state.client_disconnected(A);
        transport.take();
        state.set_app_id(handle, "firefox");

        assert_eq!(
            transport.take(),
            vec![Call::Send(
                res_b,
                ManagerEvent::AppId {
                    app_id: "firefox".to_owned()
                }
            )]
        );
        assert_eq!(state.bound_clients().collect::<Vec<_>>(), vec![B]);
    }

    #[test]
    fn hidden_is_broadcast_once_per_change() {
        let transport = RecordingTransport::default();
        let mut state = DesktopManagerState::new(Box::new(transport.clone()), true);
        state.bind(A, ResourceId(10));
        let handle = state.create_handle(views(1)[0], HandleKind::Toplevel);
        let res = state.resource_for(handle, A).unwrap();
        transport.take();

        state.set_hidden(handle, true);
        state.set_hidden(handle, true);
        state.set_hidden(handle, false);

        assert_eq!(
            transport.take(),
            vec![
                Call::Send(res, ManagerEvent::Hidden { hidden: true }),
                Call::Send(res, ManagerEvent::Hidden { hidden: false }),
            ]
        );
    }

    struct Handler {
        state: DesktopManagerState,
        hidden: Vec<ViewId>,
    }

    impl DesktopManagerHandler for Handler {
        fn desktop_manager_state(&mut self) -> &mut DesktopManagerState {
            &mut self.state
        }

        fn hide_requested(&mut self, view: ViewId) {
            self.hidden.push(view);
        }
    }

    #[test]
    fn hide_request_reaches_handler() {
        let transport = RecordingTransport::default();
        let mut handler = Handler {
            state: DesktopManagerState::new(Box::new(transport), true),
            hidden: Vec::new(),
        };
        handler.state.bind(A, ResourceId(10));
        let view = views(1)[0];
        let handle = handler.state.create_handle(view, HandleKind::Toplevel);
        let resource = handler.state.resource_for(handle, A).unwrap();

        DesktopManagerState::request(&mut handler, B, resource, ViewRequest::Hide);
        assert!(handler.hidden.is_empty());

        DesktopManagerState::request(&mut handler, A, resource, ViewRequest::Hide);
        assert_eq!(handler.hidden, vec![view]);
    }
}
