//! 模拟外设（`run --simulate`）
//!
//! 按线上协议应答命令：行驶时每次测距障碍物靠近一段随机距离，
//! 停车后换一个随机的新距离（相当于掉头）。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rover_link::MockLink;
use rover_protocol::{Command, CommandFrame, RangeReading, ReplyFrame};
use tracing::warn;

const START_DISTANCE_CM: i32 = 200;

pub struct SimulatedPeripheral {
    distance_cm: i32,
    moving: bool,
    rng: StdRng,
}

impl SimulatedPeripheral {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            distance_cm: START_DISTANCE_CM,
            moving: false,
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        }
    }

    pub fn respond(&mut self, raw: &str) -> Vec<String> {
        let frame = match CommandFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Simulator: cannot parse {:?}: {}", raw, e);
                return Vec::new();
            },
        };

        let reply = match frame.command {
            Command::StopWheels => {
                if self.moving {
                    self.distance_cm = self.rng.gen_range(80..=300);
                }
                self.moving = false;
                ReplyFrame::ack(frame.id, frame.command.command_type())
            },
            Command::TurnWheels(speeds) => {
                self.moving = speeds.as_array().iter().any(|&s| s != 0);
                ReplyFrame::ack(frame.id, frame.command.command_type())
            },
            Command::FindRange {
                angle,
                max_range_cm,
                ..
            } => {
                if self.moving {
                    self.distance_cm = (self.distance_cm - self.rng.gen_range(5..=25)).max(0);
                }
                // 超出量程时报 0
                let distance_cm = if max_range_cm > 0 && self.distance_cm > i32::from(max_range_cm) {
                    0
                } else {
                    self.distance_cm
                };
                ReplyFrame::range(frame.id, RangeReading { distance_cm, angle })
            },
        };
        vec![reply.encode()]
    }
}

/// 带模拟应答的链路
pub fn link(seed: Option<u64>) -> MockLink {
    let (link, _peripheral) = MockLink::new();
    let mut peripheral = SimulatedPeripheral::new(seed);
    link.with_responder(move |raw| peripheral.respond(raw))
}
