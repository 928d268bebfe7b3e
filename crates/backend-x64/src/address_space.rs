//! The address space: block index, link tables and cache invalidation over
//! the arena.

use armjit_ir::{Block, LocationDescriptor};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::block_of_code::{BlockOfCode, CodePtr};
use crate::callbacks::{JitStateInfo, RuntimeCallbacks};
use crate::emit::{self, BlockRelocation, EmitConfig, EmittedBlockInfo};
use crate::exception_handler::{self, FakeCall, FastmemSites};

pub use crate::emit::GuestArch;

const MINIMUM_REMAINING_CODESIZE: usize = 1024 * 1024;
const FAST_DISPATCH_ENTRIES: usize = 1024;

#[repr(C)]
#[derive(Clone, Copy)]
struct FastDispatchEntry {
    descriptor: u64,
    code_ptr: u64,
}

/// Owns every emitted block: the hot descriptor-to-entry index, the
/// relinking metadata, and the reverse edges used to patch callers when a
/// block is born or dies.
pub struct AddressSpace {
    code: BlockOfCode,
    config: EmitConfig,
    block_entries: FxHashMap<u64, usize>,
    block_infos: FxHashMap<u64, EmittedBlockInfo>,
    block_references: FxHashMap<u64, FxHashSet<u64>>,
    fast_dispatch_table: Option<Box<[FastDispatchEntry; FAST_DISPATCH_ENTRIES]>>,
    fastmem_sites: FastmemSites,
    invalid_cache_generation: u64,
}

impl AddressSpace {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arch: GuestArch,
        jsi: JitStateInfo,
        mut config: EmitConfig,
        callbacks: &RuntimeCallbacks,
        code_cache_size: usize,
        far_code_offset: usize,
        step_halt_bit: u32,
        fastmem_base: Option<u64>,
        enable_fast_dispatch: bool,
    ) -> AddressSpace {
        let fast_dispatch_table = enable_fast_dispatch.then(|| {
            Box::new([FastDispatchEntry { descriptor: u64::MAX, code_ptr: 0 }; FAST_DISPATCH_ENTRIES])
        });
        if let Some(table) = &fast_dispatch_table {
            config.fast_dispatch_table = table.as_ptr().cast();
            config.fast_dispatch_table_mask = (FAST_DISPATCH_ENTRIES - 1) as u32;
        } else {
            config.fast_dispatch_table = core::ptr::null();
        }
        debug_assert!(config.arch == arch);

        let code = BlockOfCode::new(
            code_cache_size,
            far_code_offset,
            jsi,
            callbacks,
            step_halt_bit,
            config.enable_cycle_counting,
            fastmem_base,
        );

        let fastmem_sites = FastmemSites::default();
        exception_handler::register_code_range(
            code.base() as u64,
            code.base() as u64 + code.total_size() as u64,
            fastmem_sites.clone(),
        );

        AddressSpace {
            code,
            config,
            block_entries: FxHashMap::default(),
            block_infos: FxHashMap::default(),
            block_references: FxHashMap::default(),
            fast_dispatch_table,
            fastmem_sites,
            invalid_cache_generation: 0,
        }
    }

    pub fn code(&self) -> &BlockOfCode {
        &self.code
    }

    pub fn invalid_cache_generation(&self) -> u64 {
        self.invalid_cache_generation
    }

    pub fn get(&self, descriptor: LocationDescriptor) -> Option<CodePtr> {
        self.block_entries
            .get(&descriptor.value())
            .map(|&offset| self.code.base().wrapping_add(offset) as CodePtr)
    }

    /// The dispatcher's miss path: translate, emit and link a block for
    /// `descriptor` unless one already exists.
    pub fn get_or_emit(
        &mut self,
        descriptor: LocationDescriptor,
        generate_ir: &mut dyn FnMut(LocationDescriptor) -> Block,
    ) -> CodePtr {
        if let Some(entry) = self.get(descriptor) {
            self.fill_fast_dispatch(descriptor, entry);
            return entry;
        }

        if self.code.space_remaining() < MINIMUM_REMAINING_CODESIZE {
            log::warn!("code cache floor reached; performing a full clear");
            self.clear_cache();
        }

        let block = generate_ir(descriptor);
        debug_assert_eq!(block.location(), descriptor);
        let entry_offset = self.emit(&block);

        let entry = self.code.base().wrapping_add(entry_offset) as CodePtr;
        self.fill_fast_dispatch(descriptor, entry);
        entry
    }

    fn emit(&mut self, block: &Block) -> usize {
        let descriptor = block.location();
        log::debug!("emitting block for {descriptor}");

        self.code.enable_writing();

        let near = self.code.near_ptr;
        let far = self.code.far_ptr;
        let emitter = self.code.emitter_at(near);
        let (info, near_end, far_end) = emit::emit_block(emitter, far, block, &self.config);
        self.code.near_ptr = near_end;
        self.code.far_ptr = far_end;

        self.link(descriptor, &info);
        self.register_fastmem_sites(&info);

        let entry_offset = info.entry_offset;
        self.block_infos.insert(descriptor.value(), info);
        self.block_entries.insert(descriptor.value(), entry_offset);

        self.relink_for_descriptor(descriptor);

        self.code.disable_writing();
        entry_offset
    }

    /// Resolve a freshly emitted block's relocations: prelude/trampoline
    /// branches first, then block links, which are patched live when the
    /// target already exists and parked as NOPs otherwise.
    fn link(&mut self, descriptor: LocationDescriptor, info: &EmittedBlockInfo) {
        let mut emitter = self.code.emitter_at(self.code.near_ptr);

        for &(at, target) in &info.relocations {
            let addr = self.code.prelude.link_target_addr(target);
            emitter.patch_rel32(at, addr);
        }

        for (&target, sites) in &info.block_relocations {
            self.block_references
                .entry(target.value())
                .or_default()
                .insert(descriptor.value());

            let target_entry = self
                .block_entries
                .get(&target.value())
                .map(|&offset| self.code.base().wrapping_add(offset) as CodePtr);
            patch_block_links(
                &mut emitter,
                sites,
                target_entry,
                self.code.prelude.return_to_dispatcher,
            );
        }
    }

    /// A block for `descriptor` now exists: re-patch every caller that was
    /// waiting on it.
    fn relink_for_descriptor(&mut self, descriptor: LocationDescriptor) {
        let Some(references) = self.block_references.get(&descriptor.value()) else {
            return;
        };
        let target_entry = self
            .block_entries
            .get(&descriptor.value())
            .map(|&offset| self.code.base().wrapping_add(offset) as CodePtr);

        let mut emitter = self.code.emitter_at(self.code.near_ptr);
        for caller in references {
            let Some(info) = self.block_infos.get(caller) else {
                continue;
            };
            if let Some(sites) = info.block_relocations.get(&descriptor) {
                patch_block_links(
                    &mut emitter,
                    sites,
                    target_entry,
                    self.code.prelude.return_to_dispatcher,
                );
            }
        }
    }

    fn register_fastmem_sites(&mut self, info: &EmittedBlockInfo) {
        if info.fastmem_patches.is_empty() {
            return;
        }
        let base = self.code.base() as u64;
        let mut sites = self.fastmem_sites.lock();
        for patch in &info.fastmem_patches {
            sites.insert(
                base + patch.load_offset as u64,
                FakeCall {
                    call_rip: base + patch.thunk_offset as u64,
                    ret_rip: base + (patch.load_offset + patch.load_len) as u64,
                },
            );
        }
    }

    fn fill_fast_dispatch(&mut self, descriptor: LocationDescriptor, entry: CodePtr) {
        if let Some(table) = &mut self.fast_dispatch_table {
            let hash = (descriptor.value() ^ (descriptor.value() >> 13)) as usize
                & (FAST_DISPATCH_ENTRIES - 1);
            table[hash] =
                FastDispatchEntry { descriptor: descriptor.value(), code_ptr: entry as u64 };
        }
    }

    /// Drop every block. The prelude survives; emitted code is forgotten and
    /// the arena pointers rewind.
    pub fn clear_cache(&mut self) {
        log::debug!("clearing the code cache");
        self.block_entries.clear();
        self.block_infos.clear();
        self.block_references.clear();
        self.fastmem_sites.lock().clear();
        if let Some(table) = &mut self.fast_dispatch_table {
            table.fill(FastDispatchEntry { descriptor: u64::MAX, code_ptr: 0 });
        }
        self.code.clear_cache();
        self.invalid_cache_generation = self.invalid_cache_generation.wrapping_add(1);
    }

    /// Drop every block whose guest range intersects one of `ranges`
    /// (half-open byte ranges of guest addresses). Callers into dropped
    /// blocks fall back to the dispatcher.
    pub fn invalidate_cache_ranges(&mut self, ranges: &[(u64, u64)]) {
        let dead: Vec<u64> = self
            .block_infos
            .iter()
            .filter(|(_, info)| {
                let (start, len) = info.guest_range;
                let end = start + len;
                ranges.iter().any(|&(rs, rlen)| start < rs + rlen && rs < end)
            })
            .map(|(&descriptor, _)| descriptor)
            .collect();

        if dead.is_empty() {
            return;
        }
        log::debug!("invalidating {} blocks", dead.len());

        self.code.enable_writing();
        {
            let base = self.code.base() as u64;
            let mut emitter = self.code.emitter_at(self.code.near_ptr);
            for descriptor in &dead {
                self.block_entries.remove(descriptor);
                let info = self.block_infos.remove(descriptor).expect("index out of sync");

                // Revert every caller's patched branches to the miss path.
                if let Some(references) = self.block_references.get(descriptor) {
                    for caller in references {
                        let Some(caller_info) = self.block_infos.get(caller) else {
                            continue;
                        };
                        if let Some(sites) =
                            caller_info.block_relocations.get(&LocationDescriptor::new(*descriptor))
                        {
                            patch_block_links(
                                &mut emitter,
                                sites,
                                None,
                                self.code.prelude.return_to_dispatcher,
                            );
                        }
                    }
                }

                let mut sites = self.fastmem_sites.lock();
                for patch in &info.fastmem_patches {
                    sites.remove(&(base + patch.load_offset as u64));
                }
            }
        }
        self.code.disable_writing();

        if let Some(table) = &mut self.fast_dispatch_table {
            table.fill(FastDispatchEntry { descriptor: u64::MAX, code_ptr: 0 });
        }
        self.invalid_cache_generation = self.invalid_cache_generation.wrapping_add(1);
    }

    pub fn run_code(&self, state: *mut core::ffi::c_void, entry: CodePtr) -> u32 {
        self.code.run_code(state, entry)
    }

    pub fn step_code(&self, state: *mut core::ffi::c_void, entry: CodePtr) -> u32 {
        self.code.step_code(state, entry)
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        exception_handler::unregister_code_range(self.code.base() as u64);
    }
}

fn patch_block_links(
    emitter: &mut crate::assembler::CodeEmitter,
    sites: &[BlockRelocation],
    target: Option<CodePtr>,
    dispatcher: CodePtr,
) {
    for &site in sites {
        match site {
            BlockRelocation::Branch(at) => match target {
                Some(target) => emitter.patch_rel32(at, target),
                None => emitter.patch_nop5(at),
            },
            BlockRelocation::Imm64(at) => {
                let value = target.unwrap_or(dispatcher) as u64;
                emitter.patch_imm64(at, value);
            }
        }
    }
}
