/*
 * Test utilities and mock helpers for hyperfan-ecio
 *
 * This module provides a simulated ECIO embedded controller that speaks the
 * command/address/data handshake over an in-memory register bank, so the
 * driver and the controller can be exercised without touching real ports.
 */

#[cfg(test)]
pub mod test_utils {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::io;
    use std::rc::Rc;

    use crate::ecio::{DEFAULT_REGISTER_PORT, DEFAULT_VALUE_PORT};
    use crate::port::PortIo;

    const STATUS_OBF: u8 = 0x01;
    const STATUS_IBF: u8 = 0x02;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Idle,
        AddressHigh { command: u8 },
        AddressLow { command: u8, high: u8 },
        Data { address: u16 },
    }

    #[derive(Debug)]
    struct EcState {
        register_port: u16,
        value_port: u16,
        memory: Vec<u8>,
        phase: Phase,
        pending: Option<u8>,
        poisoned: bool,
        failing: HashSet<u16>,
        input_stuck: bool,
        output_stuck: bool,
        writes: Vec<(u16, u8)>,
        data_writes: Vec<(u16, u8)>,
    }

    /// Simulated ECIO controller. Clones share state, so a test can keep one
    /// handle for inspection after moving another into the driver.
    #[derive(Debug, Clone)]
    pub struct SimulatedEc {
        state: Rc<RefCell<EcState>>,
    }

    impl SimulatedEc {
        pub fn new() -> Self {
            Self::with_ports(DEFAULT_REGISTER_PORT, DEFAULT_VALUE_PORT)
        }

        pub fn with_ports(register_port: u16, value_port: u16) -> Self {
            Self {
                state: Rc::new(RefCell::new(EcState {
                    register_port,
                    value_port,
                    memory: vec![0u8; 0x10000],
                    phase: Phase::Idle,
                    pending: None,
                    poisoned: false,
                    failing: HashSet::new(),
                    input_stuck: false,
                    output_stuck: false,
                    writes: Vec::new(),
                    data_writes: Vec::new(),
                })),
            }
        }

        /// Controller with the primary bank present and, optionally, the extra bank.
        pub fn gigabyte(extra_bank: bool) -> Self {
            let ec = Self::new();
            ec.set(0x900, 1);
            if extra_bank {
                ec.set(0xC00, 1);
            }
            ec
        }

        pub fn set(&self, address: u16, value: u8) {
            self.state.borrow_mut().memory[address as usize] = value;
        }

        pub fn get(&self, address: u16) -> u8 {
            self.state.borrow().memory[address as usize]
        }

        /// Reads of `address` fail at the result phase until cleared.
        pub fn fail_reads_at(&self, address: u16) {
            self.state.borrow_mut().failing.insert(address);
        }

        pub fn clear_failures(&self) {
            self.state.borrow_mut().failing.clear();
        }

        /// Keep the input-buffer-full bit asserted forever.
        pub fn stick_input_buffer(&self) {
            self.state.borrow_mut().input_stuck = true;
        }

        /// Never assert output-buffer-full.
        pub fn stick_output_buffer(&self) {
            self.state.borrow_mut().output_stuck = true;
        }

        /// Every byte written to either port, in order.
        pub fn writes(&self) -> Vec<(u16, u8)> {
            self.state.borrow().writes.clone()
        }

        /// Completed register writes as (address, value).
        pub fn data_writes(&self) -> Vec<(u16, u8)> {
            self.state.borrow().data_writes.clone()
        }

        pub fn data_writes_to(&self, address: u16) -> usize {
            self.state
                .borrow()
                .data_writes
                .iter()
                .filter(|(a, _)| *a == address)
                .count()
        }

        pub fn clear_log(&self) {
            let mut s = self.state.borrow_mut();
            s.writes.clear();
            s.data_writes.clear();
        }
    }

    impl Default for SimulatedEc {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PortIo for SimulatedEc {
        fn read_port(&mut self, port: u16) -> io::Result<u8> {
            let mut guard = self.state.borrow_mut();
            let s = &mut *guard;
            if port == s.register_port {
                let mut status = 0u8;
                if s.input_stuck {
                    status |= STATUS_IBF;
                }
                if s.pending.is_some() && !s.output_stuck {
                    status |= STATUS_OBF;
                }
                return Ok(status);
            }
            if port == s.value_port {
                if s.poisoned {
                    s.poisoned = false;
                    s.pending = None;
                    return Err(io::Error::new(io::ErrorKind::Other, "simulated bus fault"));
                }
                return s
                    .pending
                    .take()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no result pending"));
            }
            Err(io::Error::new(io::ErrorKind::InvalidInput, "unmapped port"))
        }

        fn write_port(&mut self, port: u16, value: u8) -> io::Result<()> {
            let mut guard = self.state.borrow_mut();
            let s = &mut *guard;
            s.writes.push((port, value));
            if port == s.register_port {
                s.pending = None;
                s.poisoned = false;
                s.phase = match value {
                    0xB0 | 0xB1 => Phase::AddressHigh { command: value },
                    _ => Phase::Idle,
                };
                return Ok(());
            }
            if port != s.value_port {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "unmapped port"));
            }
            s.phase = match s.phase {
                Phase::AddressHigh { command } => Phase::AddressLow { command, high: value },
                Phase::AddressLow { command, high } => {
                    let address = u16::from(high) << 8 | u16::from(value);
                    if command == 0xB0 {
                        s.poisoned = s.failing.contains(&address);
                        s.pending = Some(s.memory[address as usize]);
                        Phase::Idle
                    } else {
                        Phase::Data { address }
                    }
                }
                Phase::Data { address } => {
                    s.memory[address as usize] = value;
                    s.data_writes.push((address, value));
                    Phase::Idle
                }
                Phase::Idle => Phase::Idle,
            };
            Ok(())
        }
    }
}
