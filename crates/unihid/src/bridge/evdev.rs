//! Linux evented bridge over `/dev/input/event*`.
//!
//! A thin shim: each input node is one character device read in non-blocking
//! mode, capabilities come from ioctl queries, and force effects are
//! uploaded as kernel `ff_effect` records. Nothing here interprets input
//! semantics — raw records are handed to the core verbatim, with native key
//! codes passing through unchanged since the cross-platform tables use the
//! same numbering.
//!
//! Reading `/dev/input` typically requires membership in the `input` group;
//! a permission failure aborts discovery with an explanatory error rather
//! than silently finding nothing.

use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;

use tracing::trace;
use unihid_core::axis::AbsAxisInfo;
use unihid_core::cell::Timestamp;
use unihid_core::deduce::{KeyBitmap, SourceCapabilities};
use unihid_core::effect::{EffectDescriptor, EffectShape, EnvelopeSpec, Waveform};
use unihid_core::force::{ForceKind, ForceKindSet};
use unihid_core::DeviceType;

use super::{
    BridgeError, BridgeProvider, DeviceBridge, EffectSlot, EventClass, ForceCapabilities,
    HardwareId, NodeSummary, RawEvent,
};

const DEV_INPUT_DIR: &str = "/dev/input";

// Event classes on the wire.
const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const EV_REL: u16 = 0x02;
const EV_ABS: u16 = 0x03;
const EV_FF: u16 = 0x15;
const EV_FF_STATUS: u16 = 0x17;
const EV_CNT: usize = 0x20;
const KEY_CNT: usize = 0x300;
const FF_CNT: usize = 0x80;

// Force-feedback capability bits.
const FF_RUMBLE: u16 = 0x50;
const FF_PERIODIC: u16 = 0x51;
const FF_CONSTANT: u16 = 0x52;
const FF_SPRING: u16 = 0x53;
const FF_FRICTION: u16 = 0x54;
const FF_DAMPER: u16 = 0x55;
const FF_INERTIA: u16 = 0x56;
const FF_RAMP: u16 = 0x57;
const FF_SQUARE: u16 = 0x58;
const FF_TRIANGLE: u16 = 0x59;
const FF_SINE: u16 = 0x5a;
const FF_SAW_UP: u16 = 0x5b;
const FF_SAW_DOWN: u16 = 0x5c;
const FF_GAIN: u16 = 0x60;
const FF_AUTOCENTER: u16 = 0x61;

// ── ioctl plumbing ────────────────────────────────────────────────────────────

const IOC_READ: libc::c_ulong = 2;
const IOC_WRITE: libc::c_ulong = 1;

/// Assembles an `_IOC` request number for the event-device ioctl family.
const fn ioc(dir: libc::c_ulong, nr: libc::c_ulong, size: usize) -> libc::c_ulong {
    (dir << 30) | ((size as libc::c_ulong) << 16) | ((b'E' as libc::c_ulong) << 8) | nr
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct InputAbsinfo {
    value: i32,
    minimum: i32,
    maximum: i32,
    fuzz: i32,
    flat: i32,
    resolution: i32,
}

#[repr(C)]
struct InputEvent {
    time: libc::timeval,
    kind: u16,
    code: u16,
    value: i32,
}

// Kernel ff_effect layout, including the parameter union.

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FfTrigger {
    button: u16,
    interval: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FfReplay {
    length: u16,
    delay: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FfEnvelope {
    attack_length: u16,
    attack_level: u16,
    fade_length: u16,
    fade_level: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FfConstantEffect {
    level: i16,
    envelope: FfEnvelope,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FfRampEffect {
    start_level: i16,
    end_level: i16,
    envelope: FfEnvelope,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct FfPeriodicEffect {
    waveform: u16,
    period: u16,
    magnitude: i16,
    offset: i16,
    phase: u16,
    envelope: FfEnvelope,
    custom_len: u32,
    custom_data: *mut i16,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FfConditionEffect {
    right_saturation: u16,
    left_saturation: u16,
    right_coeff: i16,
    left_coeff: i16,
    deadband: u16,
    center: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FfRumbleEffect {
    strong_magnitude: u16,
    weak_magnitude: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
union FfEffectParams {
    constant: FfConstantEffect,
    ramp: FfRampEffect,
    periodic: FfPeriodicEffect,
    condition: [FfConditionEffect; 2],
    rumble: FfRumbleEffect,
}

#[repr(C)]
struct FfEffect {
    kind: u16,
    id: i16,
    direction: u16,
    trigger: FfTrigger,
    replay: FfReplay,
    params: FfEffectParams,
}

fn fetch_bit(bits: &[u8], at: u16) -> bool {
    let (byte, bit) = (usize::from(at) / 8, usize::from(at) % 8);
    byte < bits.len() && bits[byte] & (1 << bit) != 0
}

/// `EVIOCGBIT(class, ...)`: capability bitfield of one event class (class 0
/// reports which classes exist at all).
fn read_capability_bits(fd: libc::c_int, class: u16, bits: &mut [u8]) -> bool {
    let request = ioc(IOC_READ, 0x20 + libc::c_ulong::from(class), bits.len());
    unsafe { libc::ioctl(fd, request, bits.as_mut_ptr()) >= 0 }
}

fn read_string(fd: libc::c_int, nr: libc::c_ulong) -> Option<String> {
    let mut buf = [0u8; 256];
    let request = ioc(IOC_READ, nr, buf.len() - 1);
    if unsafe { libc::ioctl(fd, request, buf.as_mut_ptr()) } < 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let text = String::from_utf8_lossy(&buf[..end]).into_owned();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn query_capabilities(fd: libc::c_int) -> SourceCapabilities {
    let mut ev_bits = [0u8; EV_CNT.div_ceil(8)];
    let mut key_bits = [0u8; KEY_CNT.div_ceil(8)];
    read_capability_bits(fd, 0, &mut ev_bits);
    read_capability_bits(fd, EV_KEY, &mut key_bits);

    SourceCapabilities {
        has_sync: ev_bits.iter().any(|&b| b != 0) && fetch_bit(&ev_bits, EV_SYN),
        has_relative: fetch_bit(&ev_bits, EV_REL),
        has_absolute: fetch_bit(&ev_bits, EV_ABS),
        has_force_feedback: fetch_bit(&ev_bits, EV_FF),
        keys: KeyBitmap::from_bytes(&key_bits),
    }
}

/// Hardware identity with the three-step fallback: driver unique id, then
/// physical location plus bus metadata, then the node index.
fn query_hardware_id(fd: libc::c_int, index: u32) -> HardwareId {
    if let Some(unique) = read_string(fd, 0x08) {
        return HardwareId::Unique(unique);
    }
    if let Some(location) = read_string(fd, 0x07) {
        let mut id = InputId::default();
        let request = ioc(IOC_READ, 0x02, std::mem::size_of::<InputId>());
        if unsafe { libc::ioctl(fd, request, &mut id as *mut InputId) } >= 0 {
            return HardwareId::Physical {
                location,
                bus: id.bustype,
                vendor: id.vendor,
                product: id.product,
                version: id.version,
            };
        }
    }
    HardwareId::Node(index)
}

/// Iterates `/dev/input/event*` in directory order, yielding `(index, path)`.
fn event_nodes() -> Vec<(u32, CString)> {
    let Ok(entries) = fs::read_dir(DEV_INPUT_DIR) else {
        return Vec::new();
    };
    let mut nodes = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(index) = name
            .to_str()
            .and_then(|name| name.strip_prefix("event"))
            .and_then(|digits| digits.parse::<u32>().ok())
        else {
            continue;
        };
        if let Ok(path) = CString::new(entry.path().as_os_str().as_bytes()) {
            nodes.push((index, path));
        }
    }
    nodes
}

fn open_node(path: &CString, flags: libc::c_int) -> Result<libc::c_int, BridgeError> {
    let fd = unsafe { libc::open(path.as_ptr(), flags | libc::O_NONBLOCK | libc::O_CLOEXEC) };
    if fd >= 0 {
        return Ok(fd);
    }
    let errno = std::io::Error::last_os_error();
    match errno.raw_os_error() {
        Some(libc::EACCES) | Some(libc::EPERM) => Err(BridgeError::PermissionDenied {
            node: path.to_string_lossy().into_owned(),
        }),
        _ => Err(BridgeError::Io { detail: errno.to_string() }),
    }
}

/// Enumerates and re-opens `/dev/input` event nodes.
pub struct EvdevProvider;

impl EvdevProvider {
    pub fn new() -> Self {
        EvdevProvider
    }
}

impl Default for EvdevProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeProvider for EvdevProvider {
    fn scan(&mut self) -> Result<Vec<NodeSummary>, BridgeError> {
        let mut summaries = Vec::new();
        for (index, path) in event_nodes() {
            let fd = match open_node(&path, libc::O_RDONLY) {
                Ok(fd) => fd,
                // Missing permission is permanent and user-fixable; report
                // it instead of discovering nothing.
                Err(err @ BridgeError::PermissionDenied { .. }) => return Err(err),
                Err(_) => continue,
            };
            let summary = NodeSummary {
                hardware_id: query_hardware_id(fd, index),
                capabilities: query_capabilities(fd),
            };
            unsafe { libc::close(fd) };
            summaries.push(summary);
        }
        Ok(summaries)
    }

    fn open(
        &mut self,
        hardware_id: &HardwareId,
        expected: DeviceType,
    ) -> Option<Box<dyn DeviceBridge>> {
        for (index, path) in event_nodes() {
            let Ok(fd) = open_node(&path, libc::O_RDWR) else {
                continue;
            };
            if query_hardware_id(fd, index) != *hardware_id
                || unihid_core::deduce_device_type(&query_capabilities(fd)) != expected
            {
                unsafe { libc::close(fd) };
                continue;
            }
            // Timestamps must be comparable with the library's own clock
            // samples.
            let mut clock: libc::c_int = libc::CLOCK_REALTIME;
            let request = ioc(IOC_WRITE, 0xa0, std::mem::size_of::<libc::c_int>());
            if unsafe { libc::ioctl(fd, request, &mut clock as *mut libc::c_int) } < 0 {
                unsafe { libc::close(fd) };
                continue;
            }
            trace!(node = index, "opened input node");
            return Some(Box::new(EvdevBridge { fd }));
        }
        None
    }
}

/// One open event-device file descriptor.
struct EvdevBridge {
    fd: libc::c_int,
}

impl Drop for EvdevBridge {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

impl EvdevBridge {
    fn write_event(&self, kind: u16, code: u16, value: i32) -> bool {
        let ev = InputEvent {
            time: libc::timeval { tv_sec: 0, tv_usec: 0 },
            kind,
            code,
            value,
        };
        let written = unsafe {
            libc::write(
                self.fd,
                &ev as *const InputEvent as *const libc::c_void,
                std::mem::size_of::<InputEvent>(),
            )
        };
        written == std::mem::size_of::<InputEvent>() as isize
    }
}

impl DeviceBridge for EvdevBridge {
    fn read_event(&mut self) -> Result<Option<RawEvent>, BridgeError> {
        loop {
            let mut ev = InputEvent {
                time: libc::timeval { tv_sec: 0, tv_usec: 0 },
                kind: 0,
                code: 0,
                value: 0,
            };
            let size = std::mem::size_of::<InputEvent>();
            let read = unsafe {
                libc::read(self.fd, &mut ev as *mut InputEvent as *mut libc::c_void, size)
            };
            if read < 0 {
                let errno = std::io::Error::last_os_error();
                return match errno.raw_os_error() {
                    Some(libc::EAGAIN) => Ok(None),
                    _ => Err(BridgeError::Io { detail: errno.to_string() }),
                };
            }
            if read as usize != size {
                return Err(BridgeError::Io { detail: "short event read".into() });
            }

            let class = match ev.kind {
                EV_SYN => EventClass::Sync,
                EV_KEY => EventClass::Key,
                EV_REL => EventClass::Relative,
                EV_ABS => EventClass::Absolute,
                EV_FF_STATUS => EventClass::ForceStatus,
                // Other classes (miscellaneous, LEDs, ...) carry nothing the
                // device model replicates.
                _ => continue,
            };
            let timestamp = ev.time.tv_sec as Timestamp * 1_000_000
                + ev.time.tv_usec as Timestamp;
            return Ok(Some(RawEvent { class, code: ev.code, value: ev.value, timestamp }));
        }
    }

    fn display_name(&self) -> String {
        read_string(self.fd, 0x06).unwrap_or_default()
    }

    fn global_key_state(&mut self) -> Result<KeyBitmap, BridgeError> {
        let mut bits = [0u8; KEY_CNT.div_ceil(8)];
        let request = ioc(IOC_READ, 0x18, bits.len());
        if unsafe { libc::ioctl(self.fd, request, bits.as_mut_ptr()) } < 0 {
            return Err(BridgeError::Io {
                detail: std::io::Error::last_os_error().to_string(),
            });
        }
        Ok(KeyBitmap::from_bytes(&bits))
    }

    fn abs_axis(&mut self, code: u16) -> Option<AbsAxisInfo> {
        let mut info = InputAbsinfo::default();
        let request = ioc(
            IOC_READ,
            0x40 + libc::c_ulong::from(code),
            std::mem::size_of::<InputAbsinfo>(),
        );
        if unsafe { libc::ioctl(self.fd, request, &mut info as *mut InputAbsinfo) } < 0 {
            return None;
        }
        Some(AbsAxisInfo { minimum: info.minimum, maximum: info.maximum, value: info.value })
    }

    fn force_capabilities(&mut self) -> ForceCapabilities {
        let mut bits = [0u8; FF_CNT.div_ceil(8)];
        read_capability_bits(self.fd, EV_FF, &mut bits);

        let mut kinds = ForceKindSet::empty();
        for (bit, kind) in [
            (FF_RUMBLE, ForceKind::Rumble),
            (FF_CONSTANT, ForceKind::Constant),
            (FF_RAMP, ForceKind::Ramp),
            (FF_SPRING, ForceKind::Spring),
            (FF_FRICTION, ForceKind::Friction),
            (FF_DAMPER, ForceKind::Damper),
            (FF_INERTIA, ForceKind::Inertia),
        ] {
            if fetch_bit(&bits, bit) {
                kinds.insert(kind);
            }
        }
        // One periodic capability bit covers every waveform.
        if fetch_bit(&bits, FF_PERIODIC) {
            for kind in [
                ForceKind::Sine,
                ForceKind::Triangle,
                ForceKind::Square,
                ForceKind::SawtoothUp,
                ForceKind::SawtoothDown,
            ] {
                kinds.insert(kind);
            }
        }

        let mut max_effects: libc::c_int = 0;
        let request = ioc(IOC_READ, 0x84, std::mem::size_of::<libc::c_int>());
        if unsafe { libc::ioctl(self.fd, request, &mut max_effects as *mut libc::c_int) } < 0 {
            max_effects = 0;
        }

        ForceCapabilities {
            kinds,
            supports_gain: fetch_bit(&bits, FF_GAIN),
            supports_autocenter: fetch_bit(&bits, FF_AUTOCENTER),
            max_effects: max_effects.max(0) as u32,
        }
    }

    fn upload_effect(
        &mut self,
        slot: Option<EffectSlot>,
        descriptor: &EffectDescriptor,
    ) -> Result<EffectSlot, BridgeError> {
        let mut effect = build_ff_effect(descriptor);
        effect.id = slot.unwrap_or(-1);
        let request = ioc(IOC_WRITE, 0x80, std::mem::size_of::<FfEffect>());
        if unsafe { libc::ioctl(self.fd, request, &mut effect as *mut FfEffect) } < 0
            || effect.id < 0
        {
            return Err(BridgeError::Io {
                detail: std::io::Error::last_os_error().to_string(),
            });
        }
        Ok(effect.id)
    }

    fn erase_effect(&mut self, slot: EffectSlot) {
        let request = ioc(IOC_WRITE, 0x81, std::mem::size_of::<libc::c_int>());
        unsafe { libc::ioctl(self.fd, request, libc::c_int::from(slot)) };
    }

    fn play_effect(&mut self, slot: EffectSlot, repeat: i32) -> Result<(), BridgeError> {
        if self.write_event(EV_FF, slot as u16, repeat) {
            Ok(())
        } else {
            Err(BridgeError::Io {
                detail: std::io::Error::last_os_error().to_string(),
            })
        }
    }

    fn stop_effect(&mut self, slot: EffectSlot) -> Result<(), BridgeError> {
        if self.write_event(EV_FF, slot as u16, 0) {
            Ok(())
        } else {
            Err(BridgeError::Io {
                detail: std::io::Error::last_os_error().to_string(),
            })
        }
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.write_event(EV_FF, FF_GAIN, (gain * f32::from(u16::MAX)) as i32);
    }

    fn disable_autocenter(&mut self) {
        self.write_event(EV_FF, FF_AUTOCENTER, 0);
    }
}

// ── Descriptor translation to kernel records ──────────────────────────────────

fn native_effect_type(kind: ForceKind) -> u16 {
    match kind {
        ForceKind::Rumble => FF_RUMBLE,
        ForceKind::Constant => FF_CONSTANT,
        ForceKind::Ramp => FF_RAMP,
        ForceKind::Sine
        | ForceKind::Triangle
        | ForceKind::Square
        | ForceKind::SawtoothUp
        | ForceKind::SawtoothDown => FF_PERIODIC,
        ForceKind::Spring => FF_SPRING,
        ForceKind::Friction => FF_FRICTION,
        ForceKind::Damper => FF_DAMPER,
        ForceKind::Inertia => FF_INERTIA,
    }
}

fn native_waveform(waveform: Waveform) -> u16 {
    match waveform {
        Waveform::Sine => FF_SINE,
        Waveform::Triangle => FF_TRIANGLE,
        Waveform::Square => FF_SQUARE,
        Waveform::SawtoothUp => FF_SAW_UP,
        Waveform::SawtoothDown => FF_SAW_DOWN,
    }
}

fn native_envelope(envelope: EnvelopeSpec) -> FfEnvelope {
    FfEnvelope {
        attack_length: envelope.attack_ms,
        attack_level: envelope.attack_level,
        fade_length: envelope.fade_ms,
        fade_level: envelope.fade_level,
    }
}

fn build_ff_effect(descriptor: &EffectDescriptor) -> FfEffect {
    let params = match descriptor.shape {
        EffectShape::Rumble { strong, weak } => FfEffectParams {
            rumble: FfRumbleEffect { strong_magnitude: strong, weak_magnitude: weak },
        },
        EffectShape::Constant { level, envelope } => FfEffectParams {
            constant: FfConstantEffect { level, envelope: native_envelope(envelope) },
        },
        EffectShape::Ramp { start_level, end_level, envelope } => FfEffectParams {
            ramp: FfRampEffect {
                start_level,
                end_level,
                envelope: native_envelope(envelope),
            },
        },
        EffectShape::Periodic { waveform, period_ms, magnitude, offset, phase, envelope } => {
            FfEffectParams {
                periodic: FfPeriodicEffect {
                    waveform: native_waveform(waveform),
                    period: period_ms,
                    magnitude,
                    offset,
                    phase,
                    envelope: native_envelope(envelope),
                    custom_len: 0,
                    custom_data: std::ptr::null_mut(),
                },
            }
        }
        EffectShape::Condition {
            right_saturation,
            left_saturation,
            right_coefficient,
            left_coefficient,
            deadband,
            center,
        } => {
            let condition = FfConditionEffect {
                right_saturation,
                left_saturation,
                right_coeff: right_coefficient,
                left_coeff: left_coefficient,
                deadband,
                center,
            };
            // The kernel wants one record per axis; mirror onto both.
            FfEffectParams { condition: [condition; 2] }
        }
    };

    FfEffect {
        kind: native_effect_type(descriptor.kind),
        id: -1,
        direction: 0,
        trigger: FfTrigger::default(),
        replay: FfReplay { length: descriptor.duration_ms, delay: 0 },
        params,
    }
}
