//! Builder interface for appending micro-ops to a block.

use crate::acc_type::AccType;
use crate::block::Block;
use crate::cond::Cond;
use crate::opcode::Opcode;
use crate::reg::{A32ExtReg, A32Reg, A64Reg, A64Vec};
use crate::terminal::Terminal;
use crate::value::Value;

/// A result value paired with the carry-out of the producing operation.
#[derive(Clone, Copy, Debug)]
pub struct ResultAndCarry {
    pub result: Value,
    pub carry: Value,
}

/// Appends IR to a block. Owns the block for the duration of translation.
pub struct IrEmitter {
    pub block: Block,
}

impl IrEmitter {
    pub fn new(block: Block) -> IrEmitter {
        IrEmitter { block }
    }

    /// Append an instruction and return its result value.
    pub fn inst(&mut self, opcode: Opcode, args: &[Value]) -> Value {
        Value::Inst(self.block.append(opcode, args))
    }

    pub fn set_term(&mut self, terminal: Terminal) {
        self.block.set_terminal(terminal);
    }

    // Immediates.

    pub fn imm1(&self, value: bool) -> Value {
        Value::U1(value)
    }

    pub fn imm8(&self, value: u8) -> Value {
        Value::U8(value)
    }

    pub fn imm32(&self, value: u32) -> Value {
        Value::U32(value)
    }

    pub fn imm64(&self, value: u64) -> Value {
        Value::U64(value)
    }

    // Pseudo operations.

    pub fn carry_from(&mut self, op: Value) -> Value {
        debug_assert!(self.producer_may(op, Opcode::may_produce_carry));
        self.inst(Opcode::GetCarryFromOp, &[op])
    }

    pub fn overflow_from(&mut self, op: Value) -> Value {
        debug_assert!(self.producer_may(op, Opcode::may_produce_overflow));
        self.inst(Opcode::GetOverflowFromOp, &[op])
    }

    pub fn nzcv_from(&mut self, op: Value) -> Value {
        debug_assert!(self.producer_may(op, Opcode::may_produce_nzcv));
        self.inst(Opcode::GetNZCVFromOp, &[op])
    }

    fn producer_may(&self, op: Value, pred: impl Fn(Opcode) -> bool) -> bool {
        op.inst().is_some_and(|inst| pred(self.block[inst].opcode))
    }

    pub fn nzcv_from_packed_flags(&mut self, packed: Value) -> Value {
        self.inst(Opcode::NZCVFromPackedFlags, &[packed])
    }

    pub fn set_check_bit(&mut self, bit: Value) {
        self.inst(Opcode::SetCheckBit, &[bit]);
    }

    // Width manipulation.

    pub fn pack_2x32_to_1x64(&mut self, lo: Value, hi: Value) -> Value {
        self.inst(Opcode::Pack2x32To1x64, &[lo, hi])
    }

    pub fn least_significant_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::LeastSignificantWord, &[value])
    }

    pub fn most_significant_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::MostSignificantWord, &[value])
    }

    pub fn least_significant_half(&mut self, value: Value) -> Value {
        self.inst(Opcode::LeastSignificantHalf, &[value])
    }

    pub fn least_significant_byte(&mut self, value: Value) -> Value {
        self.inst(Opcode::LeastSignificantByte, &[value])
    }

    pub fn most_significant_bit(&mut self, value: Value) -> Value {
        self.inst(Opcode::MostSignificantBit, &[value])
    }

    pub fn is_zero_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::IsZero32, &[value])
    }

    pub fn is_zero_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::IsZero64, &[value])
    }

    pub fn test_bit(&mut self, value: Value, bit: Value) -> Value {
        self.inst(Opcode::TestBit, &[value, bit])
    }

    pub fn conditional_select_32(&mut self, cond: Cond, then_: Value, else_: Value) -> Value {
        self.inst(Opcode::ConditionalSelect32, &[Value::Cond(cond), then_, else_])
    }

    pub fn conditional_select_64(&mut self, cond: Cond, then_: Value, else_: Value) -> Value {
        self.inst(Opcode::ConditionalSelect64, &[Value::Cond(cond), then_, else_])
    }

    pub fn conditional_select_nzcv(&mut self, cond: Cond, then_: Value, else_: Value) -> Value {
        self.inst(Opcode::ConditionalSelectNZCV, &[Value::Cond(cond), then_, else_])
    }

    // Shifts.

    pub fn logical_shift_left_32(&mut self, value: Value, shift: Value, carry_in: Value) -> Value {
        self.inst(Opcode::LogicalShiftLeft32, &[value, shift, carry_in])
    }

    pub fn logical_shift_left_with_carry_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.logical_shift_left_32(value, shift, carry_in);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn logical_shift_left_64(&mut self, value: Value, shift: Value) -> Value {
        self.inst(Opcode::LogicalShiftLeft64, &[value, shift])
    }

    pub fn logical_shift_right_32(&mut self, value: Value, shift: Value, carry_in: Value) -> Value {
        self.inst(Opcode::LogicalShiftRight32, &[value, shift, carry_in])
    }

    pub fn logical_shift_right_with_carry_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.logical_shift_right_32(value, shift, carry_in);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn logical_shift_right_64(&mut self, value: Value, shift: Value) -> Value {
        self.inst(Opcode::LogicalShiftRight64, &[value, shift])
    }

    pub fn arithmetic_shift_right_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> Value {
        self.inst(Opcode::ArithmeticShiftRight32, &[value, shift, carry_in])
    }

    pub fn arithmetic_shift_right_with_carry_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.arithmetic_shift_right_32(value, shift, carry_in);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn arithmetic_shift_right_64(&mut self, value: Value, shift: Value) -> Value {
        self.inst(Opcode::ArithmeticShiftRight64, &[value, shift])
    }

    pub fn rotate_right_32(&mut self, value: Value, shift: Value, carry_in: Value) -> Value {
        self.inst(Opcode::RotateRight32, &[value, shift, carry_in])
    }

    pub fn rotate_right_with_carry_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.rotate_right_32(value, shift, carry_in);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn rotate_right_64(&mut self, value: Value, shift: Value) -> Value {
        self.inst(Opcode::RotateRight64, &[value, shift])
    }

    pub fn rotate_right_extended(&mut self, value: Value, carry_in: Value) -> ResultAndCarry {
        let result = self.inst(Opcode::RotateRightExtended, &[value, carry_in]);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    // Arithmetic.

    pub fn add_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Add32, &[a, b, Value::U1(false)])
    }

    pub fn add_with_carry_32(&mut self, a: Value, b: Value, carry_in: Value) -> Value {
        self.inst(Opcode::Add32, &[a, b, carry_in])
    }

    pub fn add_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Add64, &[a, b, Value::U1(false)])
    }

    pub fn add_with_carry_64(&mut self, a: Value, b: Value, carry_in: Value) -> Value {
        self.inst(Opcode::Add64, &[a, b, carry_in])
    }

    pub fn sub_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Sub32, &[a, b, Value::U1(true)])
    }

    pub fn sub_with_carry_32(&mut self, a: Value, b: Value, carry_in: Value) -> Value {
        self.inst(Opcode::Sub32, &[a, b, carry_in])
    }

    pub fn sub_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Sub64, &[a, b, Value::U1(true)])
    }

    pub fn sub_with_carry_64(&mut self, a: Value, b: Value, carry_in: Value) -> Value {
        self.inst(Opcode::Sub64, &[a, b, carry_in])
    }

    pub fn mul_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Mul32, &[a, b])
    }

    pub fn mul_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Mul64, &[a, b])
    }

    pub fn unsigned_div_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::UnsignedDiv32, &[a, b])
    }

    pub fn unsigned_div_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::UnsignedDiv64, &[a, b])
    }

    pub fn signed_div_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::SignedDiv32, &[a, b])
    }

    pub fn signed_div_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::SignedDiv64, &[a, b])
    }

    pub fn and_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::And32, &[a, b])
    }

    pub fn and_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::And64, &[a, b])
    }

    pub fn eor_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Eor32, &[a, b])
    }

    pub fn eor_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Eor64, &[a, b])
    }

    pub fn or_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Or32, &[a, b])
    }

    pub fn or_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Or64, &[a, b])
    }

    pub fn not_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::Not32, &[value])
    }

    pub fn not_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::Not64, &[value])
    }

    // Extension.

    pub fn sign_extend_byte_to_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::SignExtendByteToWord, &[value])
    }

    pub fn sign_extend_half_to_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::SignExtendHalfToWord, &[value])
    }

    pub fn sign_extend_word_to_long(&mut self, value: Value) -> Value {
        self.inst(Opcode::SignExtendWordToLong, &[value])
    }

    pub fn sign_extend_byte_to_long(&mut self, value: Value) -> Value {
        self.inst(Opcode::SignExtendByteToLong, &[value])
    }

    pub fn sign_extend_half_to_long(&mut self, value: Value) -> Value {
        self.inst(Opcode::SignExtendHalfToLong, &[value])
    }

    pub fn zero_extend_byte_to_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::ZeroExtendByteToWord, &[value])
    }

    pub fn zero_extend_half_to_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::ZeroExtendHalfToWord, &[value])
    }

    pub fn zero_extend_word_to_long(&mut self, value: Value) -> Value {
        self.inst(Opcode::ZeroExtendWordToLong, &[value])
    }

    // Byte manipulation.

    pub fn byte_reverse_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::ByteReverseWord, &[value])
    }

    pub fn byte_reverse_half(&mut self, value: Value) -> Value {
        self.inst(Opcode::ByteReverseHalf, &[value])
    }

    pub fn byte_reverse_dual(&mut self, value: Value) -> Value {
        self.inst(Opcode::ByteReverseDual, &[value])
    }

    pub fn count_leading_zeros_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::CountLeadingZeros32, &[value])
    }

    pub fn count_leading_zeros_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::CountLeadingZeros64, &[value])
    }
}

/// A32-specific helpers.
impl IrEmitter {
    pub fn a32_get_register(&mut self, reg: A32Reg) -> Value {
        self.inst(Opcode::A32GetRegister, &[Value::A32Reg(reg)])
    }

    pub fn a32_set_register(&mut self, reg: A32Reg, value: Value) {
        self.inst(Opcode::A32SetRegister, &[Value::A32Reg(reg), value]);
    }

    pub fn a32_get_ext_reg_32(&mut self, reg: A32ExtReg) -> Value {
        debug_assert!(matches!(reg, A32ExtReg::S(_)));
        self.inst(Opcode::A32GetExtendedRegister32, &[Value::A32ExtReg(reg)])
    }

    pub fn a32_set_ext_reg_32(&mut self, reg: A32ExtReg, value: Value) {
        debug_assert!(matches!(reg, A32ExtReg::S(_)));
        self.inst(Opcode::A32SetExtendedRegister32, &[Value::A32ExtReg(reg), value]);
    }

    pub fn a32_get_ext_reg_64(&mut self, reg: A32ExtReg) -> Value {
        debug_assert!(matches!(reg, A32ExtReg::D(_)));
        self.inst(Opcode::A32GetExtendedRegister64, &[Value::A32ExtReg(reg)])
    }

    pub fn a32_set_ext_reg_64(&mut self, reg: A32ExtReg, value: Value) {
        debug_assert!(matches!(reg, A32ExtReg::D(_)));
        self.inst(Opcode::A32SetExtendedRegister64, &[Value::A32ExtReg(reg), value]);
    }

    pub fn a32_get_n_flag(&mut self) -> Value {
        self.inst(Opcode::A32GetNFlag, &[])
    }

    pub fn a32_set_n_flag(&mut self, value: Value) {
        self.inst(Opcode::A32SetNFlag, &[value]);
    }

    pub fn a32_get_z_flag(&mut self) -> Value {
        self.inst(Opcode::A32GetZFlag, &[])
    }

    pub fn a32_set_z_flag(&mut self, value: Value) {
        self.inst(Opcode::A32SetZFlag, &[value]);
    }

    pub fn a32_get_c_flag(&mut self) -> Value {
        self.inst(Opcode::A32GetCFlag, &[])
    }

    pub fn a32_set_c_flag(&mut self, value: Value) {
        self.inst(Opcode::A32SetCFlag, &[value]);
    }

    pub fn a32_get_v_flag(&mut self) -> Value {
        self.inst(Opcode::A32GetVFlag, &[])
    }

    pub fn a32_set_v_flag(&mut self, value: Value) {
        self.inst(Opcode::A32SetVFlag, &[value]);
    }

    pub fn a32_or_q_flag(&mut self, value: Value) {
        self.inst(Opcode::A32OrQFlag, &[value]);
    }

    pub fn a32_get_ge_flags(&mut self) -> Value {
        self.inst(Opcode::A32GetGEFlags, &[])
    }

    pub fn a32_set_ge_flags(&mut self, value: Value) {
        self.inst(Opcode::A32SetGEFlags, &[value]);
    }

    pub fn a32_get_cpsr(&mut self) -> Value {
        self.inst(Opcode::A32GetCpsr, &[])
    }

    pub fn a32_set_cpsr(&mut self, value: Value) {
        self.inst(Opcode::A32SetCpsr, &[value]);
    }

    pub fn a32_set_cpsr_nzcv_raw(&mut self, value: Value) {
        self.inst(Opcode::A32SetCpsrNZCVRaw, &[value]);
    }

    pub fn a32_bx_write_pc(&mut self, value: Value) {
        self.inst(Opcode::A32BXWritePC, &[value]);
    }

    pub fn a32_update_upper_location_descriptor(&mut self, upper: u32) {
        self.inst(Opcode::A32UpdateUpperLocationDescriptor, &[Value::U32(upper)]);
    }

    pub fn a32_push_rsb(&mut self, descriptor: u64) {
        self.inst(Opcode::A32PushRSB, &[Value::U64(descriptor)]);
    }

    pub fn a32_call_supervisor(&mut self, imm: Value) {
        self.inst(Opcode::A32CallSupervisor, &[imm]);
    }

    pub fn a32_exception_raised(&mut self, pc: u32, exception: u64) {
        self.inst(Opcode::A32ExceptionRaised, &[Value::U32(pc), Value::U64(exception)]);
    }

    pub fn a32_get_fpscr(&mut self) -> Value {
        self.inst(Opcode::A32GetFpscr, &[])
    }

    pub fn a32_set_fpscr(&mut self, value: Value) {
        self.inst(Opcode::A32SetFpscr, &[value]);
    }

    pub fn a32_get_fpscr_nzcv(&mut self) -> Value {
        self.inst(Opcode::A32GetFpscrNZCV, &[])
    }

    pub fn a32_set_fpscr_nzcv(&mut self, nzcv: Value) {
        self.inst(Opcode::A32SetFpscrNZCV, &[nzcv]);
    }

    pub fn a32_dsb(&mut self) {
        self.inst(Opcode::A32DataSynchronizationBarrier, &[]);
    }

    pub fn a32_dmb(&mut self) {
        self.inst(Opcode::A32DataMemoryBarrier, &[]);
    }

    pub fn a32_isb(&mut self) {
        self.inst(Opcode::A32InstructionSynchronizationBarrier, &[]);
    }

    pub fn a32_clear_exclusive(&mut self) {
        self.inst(Opcode::A32ClearExclusive, &[]);
    }

    pub fn a32_read_memory_8(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A32ReadMemory8, &[vaddr, Value::AccType(acc)])
    }

    pub fn a32_read_memory_16(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A32ReadMemory16, &[vaddr, Value::AccType(acc)])
    }

    pub fn a32_read_memory_32(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A32ReadMemory32, &[vaddr, Value::AccType(acc)])
    }

    pub fn a32_read_memory_64(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A32ReadMemory64, &[vaddr, Value::AccType(acc)])
    }

    pub fn a32_exclusive_read_memory_8(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A32ExclusiveReadMemory8, &[vaddr, Value::AccType(acc)])
    }

    pub fn a32_exclusive_read_memory_16(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A32ExclusiveReadMemory16, &[vaddr, Value::AccType(acc)])
    }

    pub fn a32_exclusive_read_memory_32(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A32ExclusiveReadMemory32, &[vaddr, Value::AccType(acc)])
    }

    pub fn a32_exclusive_read_memory_64(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A32ExclusiveReadMemory64, &[vaddr, Value::AccType(acc)])
    }

    pub fn a32_write_memory_8(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A32WriteMemory8, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a32_write_memory_16(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A32WriteMemory16, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a32_write_memory_32(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A32WriteMemory32, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a32_write_memory_64(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A32WriteMemory64, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a32_exclusive_write_memory_8(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A32ExclusiveWriteMemory8, &[vaddr, value])
    }

    pub fn a32_exclusive_write_memory_16(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A32ExclusiveWriteMemory16, &[vaddr, value])
    }

    pub fn a32_exclusive_write_memory_32(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A32ExclusiveWriteMemory32, &[vaddr, value])
    }

    pub fn a32_exclusive_write_memory_64(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A32ExclusiveWriteMemory64, &[vaddr, value])
    }
}

/// A64-specific helpers.
impl IrEmitter {
    pub fn a64_get_c_flag(&mut self) -> Value {
        self.inst(Opcode::A64GetCFlag, &[])
    }

    pub fn a64_get_nzcv_raw(&mut self) -> Value {
        self.inst(Opcode::A64GetNZCVRaw, &[])
    }

    pub fn a64_set_nzcv_raw(&mut self, value: Value) {
        self.inst(Opcode::A64SetNZCVRaw, &[value]);
    }

    pub fn a64_set_nzcv(&mut self, nzcv: Value) {
        self.inst(Opcode::A64SetNZCV, &[nzcv]);
    }

    pub fn a64_get_w(&mut self, reg: A64Reg) -> Value {
        self.inst(Opcode::A64GetW, &[Value::A64Reg(reg)])
    }

    pub fn a64_get_x(&mut self, reg: A64Reg) -> Value {
        self.inst(Opcode::A64GetX, &[Value::A64Reg(reg)])
    }

    pub fn a64_get_s(&mut self, vec: A64Vec) -> Value {
        self.inst(Opcode::A64GetS, &[Value::A64Vec(vec)])
    }

    pub fn a64_get_d(&mut self, vec: A64Vec) -> Value {
        self.inst(Opcode::A64GetD, &[Value::A64Vec(vec)])
    }

    pub fn a64_get_q(&mut self, vec: A64Vec) -> Value {
        self.inst(Opcode::A64GetQ, &[Value::A64Vec(vec)])
    }

    pub fn a64_get_sp(&mut self) -> Value {
        self.inst(Opcode::A64GetSP, &[])
    }

    pub fn a64_set_w(&mut self, reg: A64Reg, value: Value) {
        self.inst(Opcode::A64SetW, &[Value::A64Reg(reg), value]);
    }

    pub fn a64_set_x(&mut self, reg: A64Reg, value: Value) {
        self.inst(Opcode::A64SetX, &[Value::A64Reg(reg), value]);
    }

    pub fn a64_set_s(&mut self, vec: A64Vec, value: Value) {
        self.inst(Opcode::A64SetS, &[Value::A64Vec(vec), value]);
    }

    pub fn a64_set_d(&mut self, vec: A64Vec, value: Value) {
        self.inst(Opcode::A64SetD, &[Value::A64Vec(vec), value]);
    }

    pub fn a64_set_q(&mut self, vec: A64Vec, value: Value) {
        self.inst(Opcode::A64SetQ, &[Value::A64Vec(vec), value]);
    }

    pub fn a64_set_sp(&mut self, value: Value) {
        self.inst(Opcode::A64SetSP, &[value]);
    }

    pub fn a64_get_fpcr(&mut self) -> Value {
        self.inst(Opcode::A64GetFpcr, &[])
    }

    pub fn a64_set_fpcr(&mut self, value: Value) {
        self.inst(Opcode::A64SetFpcr, &[value]);
    }

    pub fn a64_get_fpsr(&mut self) -> Value {
        self.inst(Opcode::A64GetFpsr, &[])
    }

    pub fn a64_set_fpsr(&mut self, value: Value) {
        self.inst(Opcode::A64SetFpsr, &[value]);
    }

    pub fn a64_set_pc(&mut self, value: Value) {
        self.inst(Opcode::A64SetPC, &[value]);
    }

    pub fn a64_push_rsb(&mut self, descriptor: u64) {
        self.inst(Opcode::A64PushRSB, &[Value::U64(descriptor)]);
    }

    pub fn a64_call_supervisor(&mut self, imm: Value) {
        self.inst(Opcode::A64CallSupervisor, &[imm]);
    }

    pub fn a64_exception_raised(&mut self, pc: u64, exception: u64) {
        self.inst(Opcode::A64ExceptionRaised, &[Value::U64(pc), Value::U64(exception)]);
    }

    pub fn a64_data_cache_operation_raised(&mut self, op: Value, vaddr: Value) {
        self.inst(Opcode::A64DataCacheOperationRaised, &[op, vaddr]);
    }

    pub fn a64_instruction_cache_operation_raised(&mut self, vaddr: Value) {
        self.inst(Opcode::A64InstructionCacheOperationRaised, &[vaddr]);
    }

    pub fn a64_dsb(&mut self) {
        self.inst(Opcode::A64DataSynchronizationBarrier, &[]);
    }

    pub fn a64_dmb(&mut self) {
        self.inst(Opcode::A64DataMemoryBarrier, &[]);
    }

    pub fn a64_isb(&mut self) {
        self.inst(Opcode::A64InstructionSynchronizationBarrier, &[]);
    }

    pub fn a64_get_cntfrq(&mut self) -> Value {
        self.inst(Opcode::A64GetCNTFRQ, &[])
    }

    pub fn a64_get_cntpct(&mut self) -> Value {
        self.inst(Opcode::A64GetCNTPCT, &[])
    }

    pub fn a64_get_ctr(&mut self) -> Value {
        self.inst(Opcode::A64GetCTR, &[])
    }

    pub fn a64_get_dczid(&mut self) -> Value {
        self.inst(Opcode::A64GetDCZID, &[])
    }

    pub fn a64_get_tpidr(&mut self) -> Value {
        self.inst(Opcode::A64GetTPIDR, &[])
    }

    pub fn a64_get_tpidrro(&mut self) -> Value {
        self.inst(Opcode::A64GetTPIDRRO, &[])
    }

    pub fn a64_set_tpidr(&mut self, value: Value) {
        self.inst(Opcode::A64SetTPIDR, &[value]);
    }

    pub fn a64_clear_exclusive(&mut self) {
        self.inst(Opcode::A64ClearExclusive, &[]);
    }

    pub fn a64_read_memory_8(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ReadMemory8, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_read_memory_16(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ReadMemory16, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_read_memory_32(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ReadMemory32, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_read_memory_64(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ReadMemory64, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_read_memory_128(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ReadMemory128, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_exclusive_read_memory_8(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ExclusiveReadMemory8, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_exclusive_read_memory_16(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ExclusiveReadMemory16, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_exclusive_read_memory_32(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ExclusiveReadMemory32, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_exclusive_read_memory_64(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ExclusiveReadMemory64, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_exclusive_read_memory_128(&mut self, vaddr: Value, acc: AccType) -> Value {
        self.inst(Opcode::A64ExclusiveReadMemory128, &[vaddr, Value::AccType(acc)])
    }

    pub fn a64_write_memory_8(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A64WriteMemory8, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a64_write_memory_16(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A64WriteMemory16, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a64_write_memory_32(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A64WriteMemory32, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a64_write_memory_64(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A64WriteMemory64, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a64_write_memory_128(&mut self, vaddr: Value, value: Value, acc: AccType) {
        self.inst(Opcode::A64WriteMemory128, &[vaddr, value, Value::AccType(acc)]);
    }

    pub fn a64_exclusive_write_memory_8(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A64ExclusiveWriteMemory8, &[vaddr, value])
    }

    pub fn a64_exclusive_write_memory_16(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A64ExclusiveWriteMemory16, &[vaddr, value])
    }

    pub fn a64_exclusive_write_memory_32(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A64ExclusiveWriteMemory32, &[vaddr, value])
    }

    pub fn a64_exclusive_write_memory_64(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A64ExclusiveWriteMemory64, &[vaddr, value])
    }

    pub fn a64_exclusive_write_memory_128(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::A64ExclusiveWriteMemory128, &[vaddr, value])
    }
}

/// Floating point helpers.
impl IrEmitter {
    pub fn fp_abs_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPAbs32, &[value])
    }

    pub fn fp_abs_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPAbs64, &[value])
    }

    pub fn fp_neg_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPNeg32, &[value])
    }

    pub fn fp_neg_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPNeg64, &[value])
    }

    pub fn fp_add_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPAdd32, &[a, b])
    }

    pub fn fp_add_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPAdd64, &[a, b])
    }

    pub fn fp_sub_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPSub32, &[a, b])
    }

    pub fn fp_sub_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPSub64, &[a, b])
    }

    pub fn fp_mul_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPMul32, &[a, b])
    }

    pub fn fp_mul_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPMul64, &[a, b])
    }

    pub fn fp_div_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPDiv32, &[a, b])
    }

    pub fn fp_div_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPDiv64, &[a, b])
    }

    pub fn fp_sqrt_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPSqrt32, &[value])
    }

    pub fn fp_sqrt_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPSqrt64, &[value])
    }

    pub fn fp_mul_add_32(&mut self, addend: Value, op1: Value, op2: Value) -> Value {
        self.inst(Opcode::FPMulAdd32, &[addend, op1, op2])
    }

    pub fn fp_mul_add_64(&mut self, addend: Value, op1: Value, op2: Value) -> Value {
        self.inst(Opcode::FPMulAdd64, &[addend, op1, op2])
    }

    pub fn fp_compare_32(&mut self, a: Value, b: Value, exc_on_qnan: Value) -> Value {
        self.inst(Opcode::FPCompare32, &[a, b, exc_on_qnan])
    }

    pub fn fp_compare_64(&mut self, a: Value, b: Value, exc_on_qnan: Value) -> Value {
        self.inst(Opcode::FPCompare64, &[a, b, exc_on_qnan])
    }

    pub fn fp_recip_estimate_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPRecipEstimate32, &[value])
    }

    pub fn fp_recip_estimate_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPRecipEstimate64, &[value])
    }

    pub fn fp_rsqrt_estimate_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPRSqrtEstimate32, &[value])
    }

    pub fn fp_rsqrt_estimate_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPRSqrtEstimate64, &[value])
    }

    pub fn fp_single_to_double(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPSingleToDouble, &[value])
    }

    pub fn fp_double_to_single(&mut self, value: Value) -> Value {
        self.inst(Opcode::FPDoubleToSingle, &[value])
    }

    pub fn fp_to_fixed(
        &mut self,
        opcode: Opcode,
        value: Value,
        fbits: u8,
        rounding: u8,
    ) -> Value {
        self.inst(opcode, &[value, Value::U8(fbits), Value::U8(rounding)])
    }
}
