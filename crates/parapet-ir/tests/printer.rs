use parapet_ir::{
    ArrayAccess, CHECK_UPPER_BOUND, CmpPred, FunctionBuilder, Module,
};

#[test]
fn straight_line_function() {
    let mut module = Module::new("sum.c");
    let index = module.add_function("sum", 1);
    let f = module.function_mut(index);
    let mut b = FunctionBuilder::new(f);
    let entry = b.add_block();
    b.switch_to(entry);
    let arr = b.alloca(10);
    let three = b.constant(3);
    let slot = b.gep(arr, three);
    let access = f.defining_inst(slot).unwrap();
    f.set_access(access, ArrayAccess::Static { count: 10 });
    let mut b = FunctionBuilder::new(f);
    b.switch_to(entry);
    b.ret(None);

    let out = module.display_function(index).to_string();
    insta::assert_snapshot!(out.trim_end(), @r"
    func @sum(%0) {
    ^0:
      %1 = alloca 10
      %3 = gep %1, 3 !array(10)
      ret
    }
    ");
}

#[test]
fn loop_with_check_call() {
    let mut module = Module::new("loop.c");
    let check_upper = module.intern(CHECK_UPPER_BOUND);
    let file = module.intern("loop.c");
    let index = module.add_function("fill", 1);
    let f = module.function_mut(index);
    let mut b = FunctionBuilder::new(f);
    let entry = b.add_block();
    let header = b.add_block();
    let body = b.add_block();
    let exit = b.add_block();

    b.switch_to(entry);
    let i_slot = b.alloca(1);
    let zero = b.constant(0);
    b.store(zero, i_slot);
    b.br(header);

    b.switch_to(header);
    let i = b.load(i_slot);
    let n = b.param(0);
    let in_range = b.icmp(CmpPred::Slt, i, n);
    b.cond_br(in_range, body, exit);

    b.switch_to(body);
    let i2 = b.load(i_slot);
    let nine = b.constant(9);
    let file_ref = b.func().global_ref(file);
    let line = b.constant(4);
    b.call_void(check_upper, [nine, i2, file_ref, line]);
    let one = b.constant(1);
    let next = b.add(i2, one);
    b.store(next, i_slot);
    b.br(header);

    b.switch_to(exit);
    b.ret(None);

    let out = module.display_function(index).to_string();
    insta::assert_snapshot!(out.trim_end(), @r#"
    func @fill(%0) {
    ^0:
      %1 = alloca 1
      store 0, %1
      br ^1
    ^1:
      %3 = load %1
      %4 = icmp slt %3, %0
      condbr %4, ^2, ^3
    ^2:
      %5 = load %1
      call @checkUpperBound(9, %5, @"loop.c", 4)
      %10 = add %5, 1
      store %10, %1
      br ^1
    ^3:
      ret
    }
    "#);
}
