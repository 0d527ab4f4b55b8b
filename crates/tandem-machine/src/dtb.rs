//! Hardware-descriptor synthesis and external-blob validation.
//!
//! Synthesis runs in a fixed order so handle numbering is reproducible:
//! clock sources first (peripherals reference them), then memory, then the
//! cores with their local interrupt controllers (the shared controller
//! references those), then the shared controller, then the peripherals,
//! and finally the aliases and chosen nodes.

use tandem_fdt::Fdt;
use tandem_soc::{BoardSpec, RegionId, SocModel};

use crate::error::{MachineError, Result};

/// Bytes of each serial port's register window advertised in `reg`; the
/// rest of the 4 KiB region is unused by the device.
const UART_REG_SIZE: u64 = 0x400;

/// Synthesize the canonical descriptor for one platform instance.
pub fn synthesize(
    board: &BoardSpec,
    soc: &SocModel,
    ram_size: u64,
    bootargs: &str,
) -> tandem_fdt::Result<Fdt> {
    let mut fdt = Fdt::create_root();
    let root = fdt.root();
    fdt.set_str(root, "model", &board.model)?;
    fdt.set_str(root, "compatible", &board.compatible)?;

    let soc_node = fdt.add_node(root, "soc")?;
    fdt.set_flag(soc_node, "ranges")?;
    fdt.set_str(soc_node, "compatible", "simple-bus")?;
    fdt.set_cell(soc_node, "#size-cells", 2)?;
    fdt.set_cell(soc_node, "#address-cells", 2)?;

    // Clock sources. Handles 1 and 2 by construction.
    let def_clk = fdt.add_node(root, "def-clock")?;
    let def_clk_handle = fdt.allocate_handle(def_clk)?;
    fdt.set_str(def_clk, "clock-output-names", "def-clock")?;
    fdt.set_cell(def_clk, "clock-frequency", board.ref_clock_hz)?;
    fdt.set_str(def_clk, "compatible", "fixed-clock")?;
    fdt.set_cell(def_clk, "#clock-cells", 0)?;

    let rtc_clk = fdt.add_node(root, "rtc-clock")?;
    fdt.allocate_handle(rtc_clk)?;
    fdt.set_str(rtc_clk, "clock-output-names", "rtc-clock")?;
    fdt.set_cell(rtc_clk, "clock-frequency", board.rtc_clock_hz)?;
    fdt.set_str(rtc_clk, "compatible", "fixed-clock")?;
    fdt.set_cell(rtc_clk, "#clock-cells", 0)?;

    let dram = board.dram();
    let memory = fdt.add_node(root, &format!("memory@{:x}", dram.base))?;
    fdt.set_str(memory, "device_type", "memory")?;
    fdt.set_reg(memory, &[(dram.base, ram_size)])?;

    // Cores, each with its local interrupt controller. The handle is
    // allocated as soon as the controller node exists so the shared
    // controller below can reference it.
    let cpus = fdt.add_node(root, "cpus")?;
    fdt.set_cell(cpus, "#address-cells", 1)?;
    fdt.set_cell(cpus, "#size-cells", 0)?;
    fdt.set_cell(cpus, "timebase-frequency", board.timebase_hz)?;

    let mut intc_handles = Vec::with_capacity(soc.cores.len());
    for core in &soc.cores {
        let cpu = fdt.add_node(cpus, &format!("cpu@{}", core.index))?;
        fdt.set_str(cpu, "compatible", "riscv")?;
        fdt.set_str(cpu, "riscv,isa", &core.isa)?;
        fdt.set_str(cpu, "mmu-type", &core.mmu_type)?;
        fdt.set_cell(cpu, "clock-frequency", board.cpu_clock_hz)?;
        fdt.set_str(cpu, "status", "okay")?;
        fdt.set_cell(cpu, "reg", core.index)?;
        fdt.set_str(cpu, "device_type", "cpu")?;

        let intc = fdt.add_node(cpu, "interrupt-controller")?;
        intc_handles.push(fdt.allocate_handle(intc)?);
        fdt.set_str(intc, "compatible", "riscv,cpu-intc")?;
        fdt.set_flag(intc, "interrupt-controller")?;
        fdt.set_cell(intc, "#interrupt-cells", 1)?;
    }

    // Local facility: (handle, line) pairs straight from the wiring table.
    let clint = fdt.add_node(soc_node, &format!("clint@{:x}", soc.clint.base))?;
    fdt.set_str_list(clint, "compatible", &["riscv,clint0"])?;
    fdt.set_reg(clint, &[(soc.clint.base, soc.clint.size)])?;
    let mut cells = Vec::with_capacity(soc.topology.local.len() * 2);
    for wire in &soc.topology.local {
        cells.push(intc_handles[wire.core as usize]);
        cells.push(wire.line);
    }
    fdt.set_cells(clint, "interrupts-extended", cells)?;

    // Shared controller: one (handle, external-line) pair per core.
    let plic = fdt.add_node(
        soc_node,
        &format!("interrupt-controller@{:x}", soc.plic.base),
    )?;
    fdt.set_cell(plic, "#interrupt-cells", 1)?;
    fdt.set_str_list(plic, "compatible", &["riscv,plic0"])?;
    fdt.set_flag(plic, "interrupt-controller")?;
    let mut cells = Vec::with_capacity(soc.topology.external.len() * 2);
    for wire in &soc.topology.external {
        cells.push(intc_handles[wire.core as usize]);
        cells.push(wire.line);
    }
    fdt.set_cells(plic, "interrupts-extended", cells)?;
    fdt.set_reg(plic, &[(soc.plic.base, soc.plic.size)])?;
    fdt.set_cell(plic, "riscv,ndev", soc.plic.ndev())?;
    let plic_handle = fdt.allocate_handle(plic)?;

    for index in 0..soc.irqs.uart_count {
        let region = board.memmap.region(RegionId::uart(index));
        let uart = fdt.add_node(soc_node, &format!("serial@{:x}", region.base))?;
        fdt.set_str(uart, "compatible", "snps,dw-apb-uart")?;
        fdt.set_reg(uart, &[(region.base, UART_REG_SIZE)])?;
        fdt.set_cells(uart, "clocks", vec![def_clk_handle])?;
        fdt.set_str(uart, "clock-names", "baudclk")?;
        fdt.set_cell(uart, "reg-shift", 2)?;
        fdt.set_cell(uart, "reg-io-width", 4)?;
        fdt.set_cell(uart, "interrupts", soc.irqs.uart(index))?;
        fdt.set_cell(uart, "interrupt-parent", plic_handle)?;
    }

    let uart0 = board.memmap.region(RegionId::Uart0);
    let aliases = fdt.add_node(root, "aliases")?;
    fdt.set_str(aliases, "uart0", &format!("/soc/serial@{:x}", uart0.base))?;

    let chosen = fdt.add_node(root, "chosen")?;
    fdt.set_str(chosen, "bootargs", bootargs)?;
    fdt.set_str(chosen, "stdout-path", "uart0:115200n8")?;

    Ok(fdt)
}

/// Check an externally supplied descriptor against the configured memory
/// layout. The blob is loaded verbatim, never patched, so a disagreement
/// about where DRAM lives must be fatal here rather than surfacing as a
/// guest crash later.
pub fn validate_memory_layout(fdt: &Fdt, dram_base: u64, ram_size: u64) -> Result<()> {
    let expected = vec![
        (dram_base >> 32) as u32,
        dram_base as u32,
        (ram_size >> 32) as u32,
        ram_size as u32,
    ];

    for &child in fdt.children(fdt.root())? {
        let node = fdt.node(child)?;
        let is_memory = node
            .property("device_type")
            .and_then(|v| v.as_str())
            .is_some_and(|s| s == "memory");
        if !is_memory {
            continue;
        }
        let Some(reg) = node.property("reg").and_then(|v| v.as_cells()) else {
            continue;
        };
        if reg == expected {
            return Ok(());
        }
        return Err(MachineError::MemoryLayoutMismatch {
            base: dram_base,
            size: ram_size,
        });
    }
    Err(MachineError::MemoryNodeMissing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_fdt::PropValue;
    use tandem_soc::{IRQ_M_EXT, IRQ_M_SOFT, IRQ_M_TIMER};

    fn duo_fdt(core_count: u32) -> Fdt {
        let board = BoardSpec::duo();
        let soc = SocModel::compose(&board, core_count).unwrap();
        synthesize(&board, &soc, board.default_ram_size, "console=ttyS0").unwrap()
    }

    fn cell(fdt: &Fdt, path: &str, name: &str) -> u32 {
        let id = fdt.find(path).unwrap_or_else(|| panic!("missing {path}"));
        fdt.node(id)
            .unwrap()
            .property(name)
            .unwrap_or_else(|| panic!("missing {path}:{name}"))
            .as_cell()
            .unwrap()
    }

    fn cells(fdt: &Fdt, path: &str, name: &str) -> Vec<u32> {
        let id = fdt.find(path).unwrap_or_else(|| panic!("missing {path}"));
        fdt.node(id)
            .unwrap()
            .property(name)
            .unwrap_or_else(|| panic!("missing {path}:{name}"))
            .as_cells()
            .unwrap()
    }

    #[test]
    fn dual_core_descriptor_has_the_expected_shape() {
        let fdt = duo_fdt(2);
        for path in [
            "/soc",
            "/def-clock",
            "/rtc-clock",
            "/memory@0",
            "/cpus/cpu@0/interrupt-controller",
            "/cpus/cpu@1/interrupt-controller",
            "/soc/clint@f0400000",
            "/soc/interrupt-controller@f0000000",
            "/soc/serial@91400000",
            "/soc/serial@91404000",
            "/aliases",
            "/chosen",
        ] {
            assert!(fdt.find(path).is_some(), "missing {path}");
        }

        let root = fdt.node(fdt.root()).unwrap();
        assert_eq!(
            root.property("model"),
            Some(&PropValue::Str("tandem duo devkit".into()))
        );
        assert_eq!(
            root.property("compatible"),
            Some(&PropValue::Str("tandem,duo".into()))
        );
    }

    #[test]
    fn handles_are_assigned_in_creation_order() {
        let fdt = duo_fdt(2);
        let handle = |path: &str| {
            let id = fdt.find(path).unwrap();
            fdt.resolve_handle(id).unwrap()
        };
        assert_eq!(handle("/def-clock"), 1);
        assert_eq!(handle("/rtc-clock"), 2);
        assert_eq!(handle("/cpus/cpu@0/interrupt-controller"), 3);
        assert_eq!(handle("/cpus/cpu@1/interrupt-controller"), 4);
        assert_eq!(handle("/soc/interrupt-controller@f0000000"), 5);
    }

    #[test]
    fn local_facility_wiring_lists_software_then_timer_per_core() {
        let fdt = duo_fdt(2);
        assert_eq!(
            cells(&fdt, "/soc/clint@f0400000", "interrupts-extended"),
            vec![3, IRQ_M_SOFT, 3, IRQ_M_TIMER, 4, IRQ_M_SOFT, 4, IRQ_M_TIMER]
        );
    }

    #[test]
    fn shared_controller_wiring_has_one_entry_per_core() {
        let two = duo_fdt(2);
        assert_eq!(
            cells(&two, "/soc/interrupt-controller@f0000000", "interrupts-extended"),
            vec![3, IRQ_M_EXT, 4, IRQ_M_EXT]
        );
        assert_eq!(
            cell(&two, "/soc/interrupt-controller@f0000000", "riscv,ndev"),
            207
        );

        let one = duo_fdt(1);
        assert_eq!(
            cells(&one, "/soc/interrupt-controller@f0000000", "interrupts-extended"),
            vec![3, IRQ_M_EXT]
        );
        assert!(one.find("/cpus/cpu@1").is_none());
    }

    #[test]
    fn serial_ports_reference_the_clock_and_controller_by_handle() {
        let fdt = duo_fdt(2);
        for (index, base) in [
            (0u32, 0x9140_0000u64),
            (1, 0x9140_1000),
            (2, 0x9140_2000),
            (3, 0x9140_3000),
            (4, 0x9140_4000),
        ] {
            let path = format!("/soc/serial@{base:x}");
            assert_eq!(cells(&fdt, &path, "clocks"), vec![1]);
            assert_eq!(cell(&fdt, &path, "interrupts"), 16 + index);
            assert_eq!(cell(&fdt, &path, "interrupt-parent"), 5);
            assert_eq!(
                cells(&fdt, &path, "reg"),
                vec![0, base as u32, 0, UART_REG_SIZE as u32]
            );
        }
    }

    #[test]
    fn cpu_nodes_carry_the_core_model() {
        let fdt = duo_fdt(2);
        let cpu1 = fdt.find("/cpus/cpu@1").unwrap();
        let node = fdt.node(cpu1).unwrap();
        assert_eq!(
            node.property("riscv,isa"),
            Some(&PropValue::Str("rv64imafdcvsu".into()))
        );
        assert_eq!(node.property("reg"), Some(&PropValue::Cell(1)));
        assert_eq!(cell(&fdt, "/cpus", "timebase-frequency"), 27_000_000);
        assert_eq!(cell(&fdt, "/cpus", "#address-cells"), 1);
    }

    #[test]
    fn chosen_and_aliases_point_at_serial_zero() {
        let fdt = duo_fdt(1);
        let aliases = fdt.node(fdt.find("/aliases").unwrap()).unwrap();
        assert_eq!(
            aliases.property("uart0"),
            Some(&PropValue::Str("/soc/serial@91400000".into()))
        );
        let chosen = fdt.node(fdt.find("/chosen").unwrap()).unwrap();
        assert_eq!(
            chosen.property("bootargs"),
            Some(&PropValue::Str("console=ttyS0".into()))
        );
        assert_eq!(
            chosen.property("stdout-path"),
            Some(&PropValue::Str("uart0:115200n8".into()))
        );
    }

    #[test]
    fn memory_node_reflects_the_configured_ram_size() {
        let fdt = duo_fdt(2);
        assert_eq!(cells(&fdt, "/memory@0", "reg"), vec![0, 0, 0, 0x8000_0000]);
        validate_memory_layout(&fdt, 0, 0x8000_0000).unwrap();
    }

    #[test]
    fn synthesized_blob_survives_a_parse_round_trip() {
        let fdt = duo_fdt(2);
        let bytes = fdt.to_bytes().unwrap();
        let parsed = Fdt::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.paths(), fdt.paths());
        validate_memory_layout(&parsed, 0, 0x8000_0000).unwrap();
    }

    #[test]
    fn validation_rejects_a_disagreeing_memory_node() {
        let fdt = duo_fdt(2);
        let err = validate_memory_layout(&fdt, 0, 0x4000_0000).unwrap_err();
        assert!(matches!(err, MachineError::MemoryLayoutMismatch { .. }));
    }

    #[test]
    fn validation_rejects_a_blob_without_memory() {
        let mut fdt = Fdt::create_root();
        fdt.add_node(fdt.root(), "soc").unwrap();
        let err = validate_memory_layout(&fdt, 0, 0x8000_0000).unwrap_err();
        assert!(matches!(err, MachineError::MemoryNodeMissing));
    }
}
