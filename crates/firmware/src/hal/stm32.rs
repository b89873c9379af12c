//! Embassy + PAC binding of I2C1 on PB6/PB9.
//!
//! `start_read` only queues the request; the acquisition task takes it,
//! awaits the DMA `write_read` and feeds the outcome to the engine's
//! completion or error entry point. That await stands in for the
//! transfer-complete and error interrupts.
//!
//! Reset, reinit and the busy-flag workaround are register writes through
//! the PAC because embassy-stm32 does not expose them. The line driver
//! switches PB6/PB9 between AF4 and open-drain output through the PAC so the
//! I2C driver keeps owning the pins.

use core::convert::Infallible;

use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::pac;
use embassy_stm32::pac::gpio::vals as gpio_vals;
use embassy_stm32::pac::i2c::vals as i2c_vals;
use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH6, I2C1};
use embassy_time::{block_for, with_timeout, Duration};
use platform::dma_safety::{DmaBuffer, SramRegion, I2C_LANDING_BUFFER_BYTES};
use platform::{
    BusAddress, BusError, BusLines, ErrorCode, I2cMaster, LineMode, PeripheralControl, PinState,
    ReadRequest,
};

use super::{i2c_timing, APB1_HZ, I2C_BUS_HZ, SCL_PIN, SDA_PIN, TRANSFER_TIMEOUT_MS};

/// Embassy driver for I2C1 with its DMA streams.
pub type I2c1 = I2c<'static, I2C1, DMA1_CH6, DMA1_CH0>;

fn bus_error(err: i2c::Error) -> BusError {
    match err {
        i2c::Error::Nack => BusError::Nack,
        i2c::Error::Timeout => BusError::Timeout,
        i2c::Error::Arbitration => BusError::ArbitrationLost,
        i2c::Error::Overrun => BusError::Overrun,
        i2c::Error::ZeroLengthTransfer => BusError::NotReady,
        _ => BusError::Bus,
    }
}

/// I2C1 master: queued non-blocking reads, blocking select/probe.
pub struct Stm32I2c {
    i2c: I2c1,
    pending: Option<ReadRequest>,
    armed: bool,
    enabled: bool,
    landing: DmaBuffer<SramRegion, I2C_LANDING_BUFFER_BYTES>,
}

impl Stm32I2c {
    /// Wrap an initialized driver.
    pub fn new(i2c: I2c1) -> Self {
        Self {
            i2c,
            pending: None,
            armed: false,
            enabled: true,
            landing: DmaBuffer::new(),
        }
    }

    /// Take the queued read, if any.
    pub fn take_request(&mut self) -> Option<ReadRequest> {
        self.pending.take()
    }

    /// Perform `request` and return the landed bytes, or the error mask the
    /// error interrupt would have reported.
    pub async fn run(&mut self, request: ReadRequest) -> Result<&[u8], ErrorCode> {
        let len = usize::from(request.len);
        let target = self
            .landing
            .as_dma_target()
            .get_mut(..len)
            .ok_or(ErrorCode::DMA)?;
        let outcome = with_timeout(
            Duration::from_millis(TRANSFER_TIMEOUT_MS),
            self.i2c
                .write_read(request.address.get(), &[request.register], target),
        )
        .await;
        self.armed = false;
        match outcome {
            Ok(Ok(())) => self.landing.as_slice().get(..len).ok_or(ErrorCode::DMA),
            Ok(Err(e)) => Err(ErrorCode::from(bus_error(e))),
            Err(_) => Err(ErrorCode::TIMEOUT),
        }
    }
}

impl I2cMaster for Stm32I2c {
    fn start_read(&mut self, request: ReadRequest) -> Result<(), BusError> {
        if !self.enabled {
            return Err(BusError::NotReady);
        }
        if self.armed {
            return Err(BusError::Busy);
        }
        self.pending = Some(request);
        self.armed = true;
        Ok(())
    }

    fn transmit(&mut self, address: BusAddress, bytes: &[u8]) -> Result<(), BusError> {
        self.i2c.blocking_write(address.get(), bytes).map_err(bus_error)
    }

    fn receive(&mut self, address: BusAddress, buffer: &mut [u8]) -> Result<(), BusError> {
        self.i2c.blocking_read(address.get(), buffer).map_err(bus_error)
    }
}

impl PeripheralControl for Stm32I2c {
    fn disable(&mut self) {
        pac::I2C1.cr1().modify(|w| w.set_pe(false));
        self.enabled = false;
        self.armed = false;
        self.pending = None;
    }

    fn force_reset(&mut self, hold_ms: u32) {
        let hold = Duration::from_millis(u64::from(hold_ms));
        pac::RCC.apb1rstr().modify(|w| w.set_i2c1rst(true));
        block_for(hold);
        pac::RCC.apb1rstr().modify(|w| w.set_i2c1rst(false));
        block_for(hold);
        self.armed = false;
        self.pending = None;
    }

    fn reinit(&mut self) -> Result<(), BusError> {
        let timing = i2c_timing(APB1_HZ, I2C_BUS_HZ).ok_or(BusError::NotReady)?;
        let regs = pac::I2C1;
        regs.cr1().modify(|w| w.set_pe(false));
        regs.cr2().modify(|w| w.set_freq(timing.freq_mhz));
        regs.ccr().write(|w| {
            w.set_ccr(timing.ccr);
            w.set_f_s(if timing.fast_mode {
                i2c_vals::FS::FAST
            } else {
                i2c_vals::FS::STANDARD
            });
            w.set_duty(i2c_vals::Duty::DUTY2_1);
        });
        regs.trise().write(|w| w.set_trise(timing.trise));
        regs.cr1().modify(|w| w.set_pe(true));
        self.enabled = true;
        Ok(())
    }

    fn is_busy_flag_set(&self) -> bool {
        pac::I2C1.sr2().read().busy()
    }

    fn is_idle(&self) -> bool {
        !self.armed
    }

    fn clear_stuck_flag(&mut self) {
        // ES0182 §2.5.7: an analog-filter glitch can latch BUSY; PE toggle clears it.
        pac::I2C1.cr1().modify(|w| w.set_pe(false));
        pac::I2C1.cr1().modify(|w| w.set_pe(true));
    }
}

/// PB6/PB9 driven through GPIOB registers.
#[derive(Debug, Default)]
pub struct Stm32Lines;

impl Stm32Lines {
    fn write(pin: usize, state: PinState) {
        pac::GPIOB.bsrr().write(|w| match state {
            PinState::High => w.set_bs(pin, true),
            PinState::Low => w.set_br(pin, true),
        });
    }
}

impl BusLines for Stm32Lines {
    type Error = Infallible;

    fn set_mode(&mut self, mode: LineMode) -> Result<(), Infallible> {
        let moder = match mode {
            LineMode::Peripheral => gpio_vals::Moder::ALTERNATE,
            LineMode::Gpio => gpio_vals::Moder::OUTPUT,
        };
        pac::GPIOB.otyper().modify(|w| {
            w.set_ot(SCL_PIN, gpio_vals::Ot::OPENDRAIN);
            w.set_ot(SDA_PIN, gpio_vals::Ot::OPENDRAIN);
        });
        pac::GPIOB.moder().modify(|w| {
            w.set_moder(SCL_PIN, moder);
            w.set_moder(SDA_PIN, moder);
        });
        Ok(())
    }

    fn set_scl(&mut self, state: PinState) -> Result<(), Infallible> {
        Self::write(SCL_PIN, state);
        Ok(())
    }

    fn set_sda(&mut self, state: PinState) -> Result<(), Infallible> {
        Self::write(SDA_PIN, state);
        Ok(())
    }

    fn sda(&self) -> Result<PinState, Infallible> {
        let level = pac::GPIOB.idr().read().idr(SDA_PIN);
        Ok(PinState::from(level == gpio_vals::Idr::HIGH))
    }
}
