//! Hand-off of smoothed agent state to an external renderer.
//!
//! The bridge does not draw anything. After the tick's dispatch has been
//! recorded it binds the smoothed buffers and the render-only parameters on
//! a [`RenderSink`], which is typically an instanced-mesh or particle
//! system reading the buffers as per-instance data.

use glam::Vec2;

use crate::agents::AgentStore;
use crate::config::FlockingConfig;

/// Buffer slots exposed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderSlot {
    Positions,
    Velocities,
}

impl RenderSlot {
    /// Property name the renderer looks the buffer up by.
    pub fn name(self) -> &'static str {
        match self {
            RenderSlot::Positions => "PositionBuffer",
            RenderSlot::Velocities => "VelocityBuffer",
        }
    }
}

/// Receiver of per-tick render bindings.
pub trait RenderSink<B> {
    /// Bind an agent buffer.
    fn set_buffer(&mut self, slot: RenderSlot, buffer: &B);

    /// Min/max instance scale.
    fn set_scale_range(&mut self, range: Vec2);

    fn set_animation_speed(&mut self, speed: f32);

    /// Number of instances to draw; sent on start and after every reset.
    fn set_instance_count(&mut self, _count: u32) {}
}

/// Sink that ignores everything, for headless runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl<B> RenderSink<B> for NullSink {
    fn set_buffer(&mut self, _slot: RenderSlot, _buffer: &B) {}
    fn set_scale_range(&mut self, _range: Vec2) {}
    fn set_animation_speed(&mut self, _speed: f32) {}
}

/// Forwards the smoothed buffers to a sink.
#[derive(Debug, Default)]
pub struct RenderBridge;

impl RenderBridge {
    pub fn new() -> Self {
        Self
    }

    /// Bind the smoothed buffers and render parameters.
    ///
    /// Returns how many buffers were bound; 0 when the store holds no
    /// buffers, in which case only the scalars are sent.
    pub fn publish<B, S>(&self, store: &AgentStore<B>, config: &FlockingConfig, sink: &mut S) -> u32
    where
        S: RenderSink<B> + ?Sized,
    {
        let mut bound = 0;
        if let Some(buffers) = store.buffers() {
            sink.set_buffer(RenderSlot::Positions, &buffers.smoothed_positions);
            sink.set_buffer(RenderSlot::Velocities, &buffers.smoothed_velocities);
            bound = 2;
        }
        sink.set_scale_range(config.scale_range());
        sink.set_animation_speed(config.render.animation_speed);
        bound
    }

    /// Tell the sink how many instances the current buffers hold.
    pub fn publish_instance_count<B, S>(&self, store: &AgentStore<B>, sink: &mut S)
    where
        S: RenderSink<B> + ?Sized,
    {
        if store.is_allocated() {
            sink.set_instance_count(store.count());
        }
    }
}
