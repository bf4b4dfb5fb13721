//! Ties the CPU, bus, and break-notification slot together into the single
//! fetch/decode/execute loop both the plain CLI run mode and the GDB stub
//! drive.

use crate::bus::Bus;
use crate::cpu::decode::decode;
use crate::cpu::exec::{execute, StepOutcome};
use crate::cpu::{Cpu, PC};

/// Called whenever [`Emulator::execute_instruction`] returns a break
/// condition. The default just halts and records the reason; the GDB stub
/// installs one that additionally rewinds `pc` for the two conditions that
/// must resume from the breakpoint address rather than past it.
pub type BreakHook = Box<dyn FnMut(&mut Cpu, i32) + Send>;

pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
    pub on_break: BreakHook,
}

fn default_on_break(cpu: &mut Cpu, reason: i32) {
    cpu.stopped = true;
    cpu.stop_reason = reason;
}

impl Emulator {
    pub fn new(bus: Bus) -> Self {
        Self {
            cpu: Cpu::new(),
            bus,
            on_break: Box::new(default_on_break),
        }
    }

    /// Seeds SP/PC from the first two words of the bootrom region (which
    /// must already be mapped at address 0), mirroring a real Cortex-M0+
    /// reset fetching its initial stack pointer and entry point from the
    /// vector table.
    pub fn init_from_bootrom(&mut self) {
        let sp = self.bus.read32(0);
        let pc = self.bus.read32(4) & !1;
        self.cpu.set_sp(sp);
        self.cpu.set_pc(pc);
    }

    /// Fetches, decodes, and executes exactly one instruction. Returns
    /// `true` if the CPU is still running afterward.
    pub fn execute_instruction(&mut self) -> bool {
        let pc = self.cpu.pc();
        self.cpu.pc_previous = pc;
        let hw1 = self.bus.read16(pc);
        let hw2 = self.bus.read16(pc.wrapping_add(2));
        let (instr, is_32bit) = decode(hw1, hw2);
        self.cpu.registers[PC] = pc.wrapping_add(if is_32bit { 4 } else { 2 });

        match execute(&mut self.cpu, &mut self.bus, instr) {
            StepOutcome::Continue => true,
            StepOutcome::Break(reason) => {
                let mut hook = std::mem::replace(&mut self.on_break, Box::new(default_on_break));
                hook(&mut self.cpu, reason);
                self.on_break = hook;
                false
            }
        }
    }

    /// Runs until [`Cpu::stopped`] is set, either by a break condition or by
    /// a cooperative [`Emulator::stop`] call from another thread.
    pub fn execute(&mut self) {
        while !self.cpu.stopped {
            self.execute_instruction();
        }
    }

    pub fn stop(&mut self) {
        self.cpu.stopped = true;
    }
}
