use crate::{
    bus::{Bus, Mmu},
    cpu::{Cpu, CpuConfig},
    error::CpuError,
    ppu::{DOTS_PER_FRAME, FrameBuffer, Ppu, PpuEvent},
};

/// CPU, PPU and the bus they share.
pub struct GameBoy<B: Bus = Mmu> {
    pub cpu: Cpu,
    pub ppu: Ppu,
    pub bus: B,
}

impl GameBoy<Mmu> {
    pub fn new() -> Self {
        Self::with_bus(Mmu::new())
    }
}

impl Default for GameBoy<Mmu> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Bus> GameBoy<B> {
    pub fn with_bus(bus: B) -> Self {
        Self::with_bus_and_config(bus, CpuConfig::default())
    }

    pub fn with_bus_and_config(mut bus: B, config: CpuConfig) -> Self {
        let ppu = Ppu::new();
        ppu.sync_registers(&mut bus);
        Self {
            cpu: Cpu::with_config(config),
            ppu,
            bus,
        }
    }

    /// Execute a single instruction and return the T-cycles it took.
    pub fn step_cpu(&mut self) -> Result<u32, CpuError> {
        self.cpu.step(&mut self.bus)
    }

    pub fn step_ppu(&mut self, cycles: u32) {
        if self.ppu.step(cycles, &mut self.bus) == PpuEvent::VBlank {
            self.cpu.request_interrupts();
        }
    }

    /// One instruction followed by the matching amount of PPU time.
    pub fn step(&mut self) -> Result<u32, CpuError> {
        let cycles = self.step_cpu()?;
        self.bus.tick(cycles);
        self.step_ppu(cycles);
        Ok(cycles)
    }

    /// Run until at least one frame's worth of dots has elapsed.
    ///
    /// Instructions are never split, so the result may overshoot
    /// [`DOTS_PER_FRAME`] by a few cycles.
    pub fn run_frame(&mut self) -> Result<u64, CpuError> {
        let mut elapsed = 0u64;
        while elapsed < DOTS_PER_FRAME as u64 {
            elapsed += self.step()? as u64;
        }
        Ok(elapsed)
    }

    pub fn read_frame(&self) -> &FrameBuffer {
        self.ppu.framebuffer()
    }

    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }
}
