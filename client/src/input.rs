//! Frame input sources for the headless client

use shared::ControlState;
use std::collections::VecDeque;

/// Player intent for one frame, plus the edge-triggered restart request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub controls: ControlState,
    pub restart: bool,
}

/// Produces the controls for each frame
pub trait InputSource: Send {
    fn poll(&mut self) -> FrameInput;
}

/// Never touches the controls. Keeps a connected slot alive.
#[derive(Debug, Default)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn poll(&mut self) -> FrameInput {
        FrameInput::default()
    }
}

/// Replays a fixed list of frames, then idles (or starts over when looping)
#[derive(Debug, Default)]
pub struct ScriptedInput {
    frames: VecDeque<FrameInput>,
    looped: bool,
}

impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = FrameInput>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            looped: false,
        }
    }

    pub fn looping(mut self) -> Self {
        self.looped = true;
        self
    }

    /// Thrusts forward and fires every `fire_every` frames.
    pub fn patrol(fire_every: usize) -> Self {
        let fire_every = fire_every.max(1);
        let frames = (0..fire_every).map(|frame| FrameInput {
            controls: ControlState {
                forward: true,
                turn_left: frame % 2 == 0,
                shoot: frame == 0,
                ..Default::default()
            },
            restart: false,
        });
        Self::new(frames).looping()
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> FrameInput {
        match self.frames.pop_front() {
            Some(frame) => {
                if self.looped {
                    self.frames.push_back(frame);
                }
                frame
            }
            None => FrameInput::default(),
        }
    }
}
