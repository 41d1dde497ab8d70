use crate::{
    Nora,
    shell::{LayerShellHandler, LayerSurfaceState},
    utils::{ClientId, Size, SurfaceId},
    view::{Layer, LayerData, ViewKind},
};

impl LayerShellHandler for Nora {
    fn new_layer_surface(
        &mut self,
        client: ClientId,
        surface: SurfaceId,
        output: Option<String>,
        layer: Layer,
        namespace: String,
    ) {
        let requested = output.as_deref().and_then(|name| self.tree.output_by_name(name));
        if let Some(name) = &output
            && requested.is_none()
        {
            tracing::warn!(output = %name, namespace = %namespace, "layer surface asked for unknown output");
        }
        let output = requested.or_else(|| self.output_for_new_view());

        let kind = ViewKind::Layer(LayerData {
            namespace: namespace.clone(),
            layer,
            anchor: Default::default(),
            desired_size: Size::default(),
            exclusive_zone: 0,
        });
        if let Some(view) = self.create_view(client, surface, kind, output) {
            tracing::info!(?view, %surface, namespace = %namespace, ?layer, "new layer surface");
        }
    }

    fn layer_commit(&mut self, surface: SurfaceId, state: LayerSurfaceState) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };
        let v = &mut self.views[view];
        let Some(data) = v.as_layer_mut() else {
            tracing::warn!(?view, "layer state committed on a non-layer surface");
            return;
        };
        data.anchor = state.anchor;
        data.desired_size = state.desired_size;
        data.exclusive_zone = state.exclusive_zone;
        let desired = state.desired_size;

        if v.is_mapped() {
            if let Some(output) = v.output {
                self.arrange_output(output);
            }
            return;
        }

        // Unmapped surfaces get their first configure here, a zero axis
        // meaning "as large as the output".
        let output_size = v
            .output
            .and_then(|output| self.tree.output(output))
            .map(|node| node.geometry.size)
            .unwrap_or_default();
        let size = Size::new(
            if desired.w == 0 { output_size.w } else { desired.w },
            if desired.h == 0 { output_size.h } else { desired.h },
        );
        self.backend.configure(surface, size);
    }
}
